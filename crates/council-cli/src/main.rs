//! Council CLI - run orchestration requests from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Quick answer from the judge
//! council ask "Write a hook about morning routines"
//!
//! # Full council with a user profile
//! council --config council.yaml ask --mode consensus --user alice.yaml "Is coffee healthy?"
//!
//! # Creative content
//! council ask --mode creative --content-type thread "remote work"
//!
//! # Learn from feedback
//! council learn --feedback "Less formal please" --original "Dear reader..."
//!
//! # Probe providers
//! council health
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use council_core::{Mode, PlanTier, ProcessOptions, UserContext};
use council_runtime::{EngineConfig, Orchestrator};

// ============================================================================
// CLI Definition
// ============================================================================

/// Council - multi-provider AI response orchestration.
#[derive(Parser)]
#[command(name = "council")]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config file (YAML). Provider keys may also come from the environment.
    #[arg(long, short, global = true, env = "COUNCIL_CONFIG")]
    config: Option<PathBuf>,

    /// User context file (YAML or JSON). Defaults to a local operator.
    #[arg(long, short, global = true)]
    user: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    /// Verbose output (debug logs).
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt through the council.
    Ask {
        /// fast, consensus or creative
        #[arg(long, short, default_value = "fast")]
        mode: Mode,

        /// Creative template: reel, thread or caption
        #[arg(long)]
        content_type: Option<String>,

        /// The prompt (or topic, in creative mode)
        prompt: String,
    },

    /// Extract a preference from feedback on an earlier answer.
    Learn {
        /// The user's feedback or correction
        #[arg(long)]
        feedback: String,

        /// The answer the feedback refers to
        #[arg(long)]
        original: String,
    },

    /// Check which providers respond for this user.
    Health,
}

// ============================================================================
// Setup
// ============================================================================

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("council=debug,council_runtime=debug,council_core=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env_keys())
}

fn load_user(path: Option<&Path>) -> Result<UserContext> {
    let Some(path) = path else {
        let plan = PlanTier::Enterprise;
        return Ok(UserContext::new("local")
            .with_plan(plan)
            .with_credit_balance(plan.limits().monthly_credits));
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading user context {}", path.display()))?;
    let ctx: UserContext = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing user context {}", path.display()))?;
    Ok(apply_byoa_policy(ctx))
}

/// Plans without BYOA never get to use their own keys.
fn apply_byoa_policy(mut ctx: UserContext) -> UserContext {
    if !ctx.plan.limits().byoa_enabled && !ctx.api_keys.is_empty() {
        tracing::warn!(user_id = %ctx.user_id, plan = ?ctx.plan, "Plan does not allow own keys, ignoring them");
        ctx.api_keys.clear();
    }
    ctx
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

/// Host policy: plan gating and balance checks happen before the engine runs.
fn check_allowed(ctx: &UserContext, mode: Mode, engine: &Orchestrator) -> Result<()> {
    let limits = ctx.plan.limits();
    if mode == Mode::Consensus && !limits.consensus_enabled {
        bail!("consensus mode is not available on the {:?} plan", ctx.plan);
    }

    let base = engine.costs().base_cost(mode);
    if !ctx.can_afford(base) {
        bail!(
            "insufficient credits: {} needed, {} available",
            base,
            ctx.credit_balance
        );
    }
    Ok(())
}

async fn run_ask(
    cli: &Cli,
    engine: &Orchestrator,
    ctx: &UserContext,
    mode: Mode,
    content_type: Option<&str>,
    prompt: &str,
) -> Result<ExitCode> {
    check_allowed(ctx, mode, engine)?;

    let options = match content_type {
        Some(content_type) => ProcessOptions::new().with_content_type(content_type),
        None => ProcessOptions::new(),
    };

    let result = engine.process(prompt, ctx, mode, &options).await;
    print_json(&result, cli.pretty)?;

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_learn(
    cli: &Cli,
    engine: &Orchestrator,
    ctx: &UserContext,
    feedback: &str,
    original: &str,
) -> Result<ExitCode> {
    let preference = engine.learn(ctx, feedback, original).await;
    print_json(&json!({ "preference": preference }), cli.pretty)?;
    Ok(ExitCode::SUCCESS)
}

async fn run_health(cli: &Cli, engine: &Orchestrator, ctx: &UserContext) -> Result<ExitCode> {
    let status = engine.health(ctx).await;
    let all_healthy = !status.is_empty() && status.values().all(|ok| *ok);
    print_json(&status, cli.pretty)?;

    Ok(if all_healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let ctx = load_user(cli.user.as_deref())?;
    let engine = Orchestrator::from_config(&config).context("building orchestrator")?;

    match &cli.command {
        Commands::Ask {
            mode,
            content_type,
            prompt,
        } => run_ask(cli, &engine, &ctx, *mode, content_type.as_deref(), prompt).await,
        Commands::Learn { feedback, original } => {
            run_learn(cli, &engine, &ctx, feedback, original).await
        }
        Commands::Health => run_health(cli, &engine, &ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
