//! Simplicity constraint gate.
//!
//! Hard business rule: a viable opportunity has 1-3 extracted functions.
//! Anything else is DISQUALIFIED, including zero functions — absence of
//! extracted functions is not evidence of simplicity.

use common::{ConstraintVerdict, DimensionScores, ItemProfile};
use tracing::debug;

/// Weight of the simplicity term in the adjusted composite. It stands in
/// for the monetization term, keeping the weight sum at 1.0.
const SIMPLICITY_WEIGHT: f64 = 0.30;

/// Apply the cardinality rule to a validated profile.
pub fn evaluate_functions(profile: &ItemProfile) -> ConstraintVerdict {
    evaluate_count(profile.function_count())
}

fn evaluate_count(function_count: usize) -> ConstraintVerdict {
    let simplicity_score = match function_count {
        1 => 100,
        2 => 85,
        3 => 70,
        _ => 0,
    };

    if simplicity_score == 0 {
        debug!(function_count, "simplicity constraint violated");
        ConstraintVerdict {
            is_disqualified: true,
            violation_reason: Some(format!(
                "invalid function count: {function_count} (must be 1-3)"
            )),
            simplicity_score: 0,
        }
    } else {
        ConstraintVerdict {
            is_disqualified: false,
            violation_reason: None,
            simplicity_score,
        }
    }
}

/// Composite score with simplicity substituted for the monetization term.
/// A disqualified verdict zeroes the composite outright.
pub fn adjusted_total(scores: &DimensionScores, verdict: &ConstraintVerdict) -> f64 {
    if verdict.is_disqualified {
        return 0.0;
    }
    0.20 * scores.market_demand
        + 0.25 * scores.pain_intensity
        + SIMPLICITY_WEIGHT * f64::from(verdict.simplicity_score)
        + 0.15 * scores.market_gap
        + 0.10 * scores.technical_feasibility
}
