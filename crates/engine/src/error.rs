// ABOUTME: Error taxonomy for the extraction engine: no-match, recovery, validation, malformed input.
// ABOUTME: Every failure is returned as a typed value; the engine never swallows an error.

use std::fmt;

use thiserror::Error;

/// Longest input excerpt carried by a [`RecoveryError`].
const SNIPPET_LIMIT: usize = 120;

/// A semantic slot of the article record that a strategy list is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Title,
    Subtitle,
    Author,
    AuthorUrl,
    PublishTime,
    Source,
    Tags,
    ContentRoot,
    Removal,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Slot::Title => "title",
            Slot::Subtitle => "subtitle",
            Slot::Author => "author",
            Slot::AuthorUrl => "author url",
            Slot::PublishTime => "publish time",
            Slot::Source => "source",
            Slot::Tags => "tags",
            Slot::ContentRoot => "content root",
            Slot::Removal => "removal",
        };
        write!(f, "{}", s)
    }
}

/// The stage of the quasi-JSON pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    /// Delimiting the literal assigned to a named script variable.
    Locate,
    /// Decoding `identifier('...')` string wrappers.
    Unwrap,
    /// Rewriting `'123' * 1` coercions.
    Coerce,
    /// The permissive structural decode.
    Decode,
}

impl fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoveryStage::Locate => "locate",
            RecoveryStage::Unwrap => "unwrap",
            RecoveryStage::Coerce => "coerce",
            RecoveryStage::Decode => "decode",
        };
        write!(f, "{}", s)
    }
}

/// Embedded quasi-JSON could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("embedded data recovery failed at {stage} stage: {reason} (near `{snippet}`)")]
pub struct RecoveryError {
    pub stage: RecoveryStage,
    pub snippet: String,
    pub reason: String,
}

impl RecoveryError {
    pub fn new(stage: RecoveryStage, input: &str, reason: impl Into<String>) -> Self {
        Self {
            stage,
            snippet: snippet(input),
            reason: reason.into(),
        }
    }
}

/// An invariant enforced at composition time was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("article title is empty after all fallbacks")]
    EmptyTitle,
    #[error("article has no content items")]
    EmptyContent,
}

/// The error type returned by [`crate::Extractor::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// A required slot found nothing after exhausting its cascade.
    #[error("no match for required slot: {slot}")]
    NoMatch { slot: Slot },

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The document text is not markup at all.
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },
}

impl ExtractError {
    pub fn no_match(slot: Slot) -> Self {
        ExtractError::NoMatch { slot }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ExtractError::MalformedInput {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a legitimate "nothing to extract" outcome.
    pub fn is_no_match(&self) -> bool {
        matches!(self, ExtractError::NoMatch { .. })
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, ExtractError::Recovery(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ExtractError::Validation(_))
    }

    pub fn is_malformed_input(&self) -> bool {
        matches!(self, ExtractError::MalformedInput { .. })
    }
}

/// Cuts `input` down to a diagnostic excerpt without splitting a character.
fn snippet(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(SNIPPET_LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
