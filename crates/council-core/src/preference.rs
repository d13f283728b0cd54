//! Learned user preferences and the best-effort parser that extracts them
//! from free-form model output.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

lazy_static! {
    /// First brace-delimited object. Nested objects are not supported.
    static ref JSON_OBJECT_PATTERN: Regex = Regex::new(r"\{[^}]+\}").unwrap();
}

/// Category of a learned preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Style,
    Tone,
    Format,
    Content,
}

impl PreferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKind::Style => "style",
            PreferenceKind::Tone => "tone",
            PreferenceKind::Format => "format",
            PreferenceKind::Content => "content",
        }
    }
}

impl fmt::Display for PreferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single learned preference, rendered into prompts as `key: value`.
///
/// Stored entries may omit `kind`; only freshly extracted ones always carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PreferenceKind>,
}

impl PreferenceRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: PreferenceKind) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: Some(kind),
        }
    }

    /// An entry with no category, as older stores hold them.
    pub fn untyped(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: None,
        }
    }
}

/// Shape the judge must return; `kind` is mandatory here.
#[derive(Deserialize)]
struct ExtractedPreference {
    key: String,
    value: String,
    kind: PreferenceKind,
}

/// Why a preference could not be extracted.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("malformed preference object: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse the first brace-delimited JSON object in `text` as a preference.
pub fn parse_preference(text: &str) -> Result<PreferenceRecord, ExtractionError> {
    let candidate = JSON_OBJECT_PATTERN
        .find(text)
        .ok_or(ExtractionError::NoJsonObject)?;

    let extracted: ExtractedPreference = serde_json::from_str(candidate.as_str())?;
    Ok(PreferenceRecord::new(extracted.key, extracted.value, extracted.kind))
}

/// Best-effort variant of [`parse_preference`]: failures yield `None`.
pub fn extract_preference(text: &str) -> Option<PreferenceRecord> {
    match parse_preference(text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "Preference extraction yielded nothing");
            None
        }
    }
}
