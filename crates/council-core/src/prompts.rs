//! Prompt composition for the council.
//!
//! System prompts are assembled from fixed blocks in a fixed order:
//! 1. Base persona (always)
//! 2. User identity (only when the profile has a personal description)
//! 3. Learned preferences (only when any exist, last 10)
//! 4. Role instructions (none for the general role)
//!
//! Everything here is plain string assembly; identical inputs always
//! produce identical prompts.

use crate::context::UserContext;

/// Base persona shared by every role.
pub const BASE_SYSTEM_PROMPT: &str = "You are an AI assistant specialized in content analysis and \
social media post generation. Your goal is to help the user create high-quality content that \
spreads.";

/// Tone used when the profile does not state one.
pub const DEFAULT_TONE: &str = "professional but approachable";

/// Writing style used when the profile does not state one.
pub const DEFAULT_WRITING_STYLE: &str = "balanced";

/// Audience used when the profile does not state one.
pub const DEFAULT_AUDIENCE: &str = "general audience";

/// Stand-in for a specialist analysis that did not succeed.
pub const NOT_AVAILABLE: &str = "not available";

/// How many learned preferences are injected, newest last.
pub const MAX_PREFERENCES_IN_PROMPT: usize = 10;

/// Prompt used by provider health checks.
pub const HEALTH_CHECK_PROMPT: &str = "Reply only with 'OK'";

pub const FACT_CHECKER_INSTRUCTIONS: &str = "

Your specific role is to VERIFY FACTS. Look for current data, cross-check information \
and cite sources whenever possible. Be skeptical but fair.";

pub const STYLE_ANALYZER_INSTRUCTIONS: &str = "

Your specific role is to ANALYZE STYLE AND PSYCHOLOGY. Evaluate tone, structure and \
emotional impact, and suggest improvements that maximize engagement.";

pub const JUDGE_INSTRUCTIONS: &str = "

Your specific role is to BE THE FINAL JUDGE. You will receive analyses from other experts. \
Your job is to synthesize the best ideas, resolve contradictions and produce a coherent, \
high-quality final answer.";

pub const CREATIVE_INSTRUCTIONS: &str = "

Your specific role is to CREATE VIRAL CONTENT. Write powerful hooks, structures that keep \
people reading and effective calls to action.";

/// Role a system prompt is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRole {
    /// No role-specific block.
    General,
    FactChecker,
    StyleAnalyzer,
    Judge,
    Creative,
}

impl PromptRole {
    /// Parse a role label. Unknown labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "general" => Some(PromptRole::General),
            "fact_checker" => Some(PromptRole::FactChecker),
            "style_analyzer" => Some(PromptRole::StyleAnalyzer),
            "judge" => Some(PromptRole::Judge),
            "creative" => Some(PromptRole::Creative),
            _ => None,
        }
    }

    /// The instruction block appended for this role.
    pub fn instructions(&self) -> Option<&'static str> {
        match self {
            PromptRole::General => None,
            PromptRole::FactChecker => Some(FACT_CHECKER_INSTRUCTIONS),
            PromptRole::StyleAnalyzer => Some(STYLE_ANALYZER_INSTRUCTIONS),
            PromptRole::Judge => Some(JUDGE_INSTRUCTIONS),
            PromptRole::Creative => Some(CREATIVE_INSTRUCTIONS),
        }
    }
}

/// Build the system prompt for a role.
pub fn build_system_prompt(ctx: &UserContext, role: PromptRole) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT);

    if let Some(identity) = identity_block(ctx) {
        prompt.push_str(&identity);
    }

    if let Some(preferences) = preferences_block(ctx) {
        prompt.push_str(&preferences);
    }

    if let Some(instructions) = role.instructions() {
        prompt.push_str(instructions);
    }

    prompt
}

/// Build the system prompt from a free-form role label.
///
/// An unrecognized label is treated like the general role: base prompt plus
/// identity and preference blocks, no role-specific text.
pub fn build_system_prompt_for_label(ctx: &UserContext, label: &str) -> String {
    build_system_prompt(ctx, PromptRole::from_label(label).unwrap_or(PromptRole::General))
}

fn identity_block(ctx: &UserContext) -> Option<String> {
    let profile = &ctx.profile;
    let description = profile.description()?;

    Some(format!(
        "

=== USER PROFILE ===
{description}

PREFERRED TONE: {tone}
VALUES: {values}
MAIN TOPICS: {topics}
WRITING STYLE: {style}
TARGET AUDIENCE: {audience}
FIXED HASHTAGS: {hashtags}
",
        tone = non_blank(profile.preferred_tone.as_deref()).unwrap_or(DEFAULT_TONE),
        values = profile.values.join(", "),
        topics = profile.main_topics.join(", "),
        style = non_blank(profile.writing_style.as_deref()).unwrap_or(DEFAULT_WRITING_STYLE),
        audience = non_blank(profile.audience.as_deref()).unwrap_or(DEFAULT_AUDIENCE),
        hashtags = profile.fixed_hashtags.join(", "),
    ))
}

fn preferences_block(ctx: &UserContext) -> Option<String> {
    if ctx.preferences.is_empty() {
        return None;
    }

    let start = ctx.preferences.len().saturating_sub(MAX_PREFERENCES_IN_PROMPT);
    let mut block = String::from("\n=== LEARNED PREFERENCES ===\n");
    for preference in &ctx.preferences[start..] {
        block.push_str(&format!("- {}: {}\n", preference.key, preference.value));
    }
    Some(block)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Build the synthesis prompt handed to the judge in consensus mode.
///
/// `None` for a specialist means its call did not succeed; the literal
/// [`NOT_AVAILABLE`] is embedded in its place.
pub fn build_judge_prompt(
    original_request: &str,
    fact_check: Option<&str>,
    style_analysis: Option<&str>,
) -> String {
    format!(
        "You are the FINAL JUDGE of the council. You have received analyses from two experts \
about the following user request:

=== ORIGINAL REQUEST ===
{original_request}

=== FACT CHECKER ANALYSIS ===
{fact_check}

=== STYLE AND PSYCHOLOGY ANALYSIS ===
{style_analysis}

=== YOUR TASK ===
1. Synthesize the best elements of both analyses
2. Resolve any contradiction between them
3. Add your own perspective if needed
4. Produce a FINAL ANSWER that is:
   - Factually correct
   - Stylistically optimized
   - Ready to use

Respond ONLY with the final answer, without explaining your synthesis process.",
        fact_check = fact_check.unwrap_or(NOT_AVAILABLE),
        style_analysis = style_analysis.unwrap_or(NOT_AVAILABLE),
    )
}

/// Request sent to the fact checker in consensus mode.
pub fn fact_check_request(prompt: &str) -> String {
    format!("Verify the facts and provide current data about: {prompt}")
}

/// Request sent to the style analyst in consensus mode.
pub fn style_analysis_request(prompt: &str) -> String {
    format!("Analyze the style, tone and psychology to optimize: {prompt}")
}

/// How much of the prior answer is quoted in an extraction prompt.
pub const EXTRACTION_EXCERPT_CHARS: usize = 500;

/// Prompt asking the judge to turn user feedback into a preference object.
pub fn build_extraction_prompt(feedback: &str, original_response: &str) -> String {
    let excerpt: String = original_response
        .chars()
        .take(EXTRACTION_EXCERPT_CHARS)
        .collect();

    format!(
        r#"Analyze this user feedback and extract the underlying preference.

ORIGINAL BOT RESPONSE:
{excerpt}

USER FEEDBACK/CORRECTION:
{feedback}

Extract the preference as JSON with this structure:
{{"key": "short_preference_name", "value": "description_of_the_preference", "kind": "style|tone|format|content"}}

Examples:
- "Don't be so formal" -> {{"key": "preferred_tone", "value": "casual and friendly", "kind": "tone"}}
- "More emojis" -> {{"key": "emoji_usage", "value": "use emojis frequently", "kind": "format"}}

Respond ONLY with the JSON, no explanations."#
    )
}

/// Placeholder substituted with the topic in every creative template.
pub const TOPIC_PLACEHOLDER: &str = "{topic}";

const REEL_TEMPLATE: &str = "Write a 1-minute REEL SCRIPT with this structure:

HOOK (0-3 seconds):
- A striking line that stops the scroll
- A provocative question or a surprising fact

VALUE (3-50 seconds):
- Main content split into 3-5 points
- Each point must be quotable on its own
- Use clear transitions

CTA (50-60 seconds):
- A clear call to action
- Invite people to comment, save or share

TOPIC: {topic}

Also include:
- 3 options for on-screen overlay text
- A trending music/sound suggestion
- 10 optimized hashtags";

const THREAD_TEMPLATE: &str = "Write a viral TWITTER THREAD with this structure:

1. HOOK TWEET:
- At most 280 characters
- Must spark curiosity or debate

2-8. DEVELOPMENT TWEETS:
- Each one standalone but connected
- Mix data, opinions and questions

9. SUMMARY TWEET:
- Recaps the main message

10. CTA TWEET:
- Invites retweets, follows or replies

TOPIC: {topic}";

const CAPTION_TEMPLATE: &str = "Write an INSTAGRAM CAPTION optimized for engagement:

FIRST LINE (CRUCIAL):
- A hook that shows before the \"more...\" cut
- At most 125 characters

BODY:
- A story or value in 3-4 short paragraphs
- Use emojis strategically
- Include a question that invites comments

CTA:
- Save this post if...
- Comment [emoji] if...
- Share with someone who...

HASHTAGS:
- 25-30 hashtags across 3 tiers (popular, mid, niche)

TOPIC: {topic}";

/// Content formats available in creative mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    #[default]
    Reel,
    Thread,
    Caption,
}

impl ContentType {
    /// Select a content type; unknown or missing labels fall back to `Reel`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("thread") => ContentType::Thread,
            Some("caption") => ContentType::Caption,
            _ => ContentType::Reel,
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            ContentType::Reel => REEL_TEMPLATE,
            ContentType::Thread => THREAD_TEMPLATE,
            ContentType::Caption => CAPTION_TEMPLATE,
        }
    }

    /// The template with the topic text substituted literally.
    pub fn render(&self, topic: &str) -> String {
        self.template().replacen(TOPIC_PLACEHOLDER, topic, 1)
    }
}
