// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Build verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checker::TestSummary;

/// Final pass/warn/fail classification of a build
///
/// Ordered from best to worst so that combining outcomes is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunVerdict {
    Success,
    Warnings,
    Failure,
}

impl RunVerdict {
    /// Grade a test summary: any failed test downgrades to warnings
    pub fn from_summary(summary: &TestSummary) -> Self {
        if summary.failed > 0 {
            Self::Warnings
        } else {
            Self::Success
        }
    }

    /// The worse of two verdicts
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    /// Process exit code for this verdict
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success | Self::Warnings => 0,
            Self::Failure => 1,
        }
    }
}

impl Default for RunVerdict {
    fn default() -> Self {
        Self::Success
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Warnings => write!(f, "WARNINGS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_from_summary() {
        for total in [0u64, 1, 5, 100] {
            let clean = TestSummary::from_counts(total, 0);
            assert_eq!(RunVerdict::from_summary(&clean), RunVerdict::Success);
        }
        for failed in [1u64, 2, 50] {
            let broken = TestSummary::from_counts(100, failed);
            assert_eq!(RunVerdict::from_summary(&broken), RunVerdict::Warnings);
        }
    }

    #[test]
    fn test_worst_is_max() {
        use RunVerdict::*;
        assert_eq!(Success.worst(Warnings), Warnings);
        assert_eq!(Failure.worst(Warnings), Failure);
        assert_eq!(Success.worst(Success), Success);
    }

    #[test]
    fn test_serializes_uppercase() {
        let json = serde_json::to_string(&RunVerdict::Warnings).unwrap();
        assert_eq!(json, "\"WARNINGS\"");
    }
}
