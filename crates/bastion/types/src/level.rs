//! Severity ladder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Discrete degradation rung, from healthy to emergency.
///
/// The derived `Ord` follows declaration order and drives both
/// "highest wins" aggregation and hysteresis comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationLevel {
    /// Fully operational.
    #[default]
    None,
    /// Writes suspended, reads served.
    ReadOnly,
    /// Non-essential features disabled.
    Partial,
    /// Only core paths served.
    Minimal,
    /// Survival mode.
    Emergency,
}

impl DegradationLevel {
    pub const ALL: [DegradationLevel; 5] = [
        DegradationLevel::None,
        DegradationLevel::ReadOnly,
        DegradationLevel::Partial,
        DegradationLevel::Minimal,
        DegradationLevel::Emergency,
    ];

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }

    pub fn is_degraded(&self) -> bool {
        *self != DegradationLevel::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationLevel::None => "NONE",
            DegradationLevel::ReadOnly => "READ_ONLY",
            DegradationLevel::Partial => "PARTIAL",
            DegradationLevel::Minimal => "MINIMAL",
            DegradationLevel::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown degradation level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for DegradationLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        DegradationLevel::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}
