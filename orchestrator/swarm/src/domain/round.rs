// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Round Decision
//!
//! After the judge reviews a round, the run either plans another round or
//! completes. The judge only *asks* to continue; the round limit has the
//! final word.

use conclave_core::domain::capability::Verdict;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundDecision {
    /// Persist this round and return to PLANNING with the next round number.
    Continue,
    /// Terminal: the judge stopped the run or `max_rounds` was reached.
    Complete,
}

/// Decide what follows consolidation of `round` (1-based).
pub fn decide(verdict: &Verdict, round: u32, max_rounds: u32) -> RoundDecision {
    if verdict.continue_run && round < max_rounds {
        RoundDecision::Continue
    } else {
        RoundDecision::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_verdict_completes_immediately() {
        assert_eq!(
            decide(&Verdict::stop("done"), 1, 5),
            RoundDecision::Complete
        );
    }

    #[test]
    fn test_continue_verdict_within_limit() {
        assert_eq!(
            decide(&Verdict::proceed("more"), 1, 3),
            RoundDecision::Continue
        );
        assert_eq!(
            decide(&Verdict::proceed("more"), 2, 3),
            RoundDecision::Continue
        );
    }

    #[test]
    fn test_round_limit_overrides_continue() {
        assert_eq!(
            decide(&Verdict::proceed("more"), 3, 3),
            RoundDecision::Complete
        );
        assert_eq!(
            decide(&Verdict::proceed("more"), 1, 1),
            RoundDecision::Complete
        );
    }
}
