//! Level scoring.

use std::time::Duration;

use serde::Deserialize;

/// How a correct submission is scored:
///
/// ```text
/// score = base - elapsed_ms / ms_per_point - code_chars * points_per_char
/// ```
///
/// clamped at zero. Faster and shorter solutions score higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoreRules {
    pub base: u64,
    /// Milliseconds of level time that cost one point. `0` disables the
    /// time penalty.
    pub ms_per_point: u64,
    pub points_per_char: u64,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            base: 10_000,
            ms_per_point: 10,
            points_per_char: 1,
        }
    }
}

impl ScoreRules {
    pub fn score(&self, elapsed: Duration, code_chars: usize) -> u64 {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let time_penalty = elapsed_ms.checked_div(self.ms_per_point).unwrap_or(0);
        let length_penalty = (code_chars as u64).saturating_mul(self.points_per_char);
        self.base
            .saturating_sub(time_penalty)
            .saturating_sub(length_penalty)
    }
}
