//! Shared types for the Domu voice sales agent.
//!
//! This crate holds the vocabulary every other crate speaks: the closed set
//! of caller intents that steer reply policy, and the lead profile that a
//! call is about. It has no runtime dependencies beyond `serde`, so the
//! voice, agent, and server crates can all depend on it without cycles.

pub mod lead;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use lead::{format_price_millions, LeadProfile};

/// Caller stance detected for one turn.
///
/// The set is closed. Anything a classifier produces outside of it is
/// coerced to [`Intent::Neutral`] by [`Intent::coerce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// The caller declines the offer.
    NotInterested,
    /// The caller wants to move forward.
    Interested,
    /// The caller asks to be contacted another time.
    FollowUp,
    /// No clear stance, or nothing was said.
    #[default]
    Neutral,
}

/// Error returned when a label does not name a known intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown intent label: {0:?}")]
pub struct ParseIntentError(pub String);

impl Intent {
    /// All intents, in the order classifiers check them.
    pub const ALL: [Intent; 4] = [
        Intent::NotInterested,
        Intent::FollowUp,
        Intent::Interested,
        Intent::Neutral,
    ];

    /// Returns the wire label for this intent.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotInterested => "NOT_INTERESTED",
            Self::Interested => "INTERESTED",
            Self::FollowUp => "FOLLOW_UP",
            Self::Neutral => "NEUTRAL",
        }
    }

    /// Attempts to map a label to an intent.
    ///
    /// Matching ignores case, surrounding whitespace and quotes, and accepts
    /// `-` or spaces in place of `_`. Returns `None` for anything else.
    pub fn from_label(label: &str) -> Option<Self> {
        let cleaned: String = label
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '.')
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();

        match cleaned.as_str() {
            "NOT_INTERESTED" => Some(Self::NotInterested),
            "INTERESTED" => Some(Self::Interested),
            "FOLLOW_UP" | "FOLLOWUP" => Some(Self::FollowUp),
            "NEUTRAL" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Maps any label to an intent, falling back to [`Intent::Neutral`].
    pub fn coerce(label: Option<&str>) -> Self {
        label.and_then(Self::from_label).unwrap_or_default()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Intent {
    type Err = ParseIntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| ParseIntentError(s.to_string()))
    }
}
