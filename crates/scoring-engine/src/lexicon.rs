//! Signal lexicons for the dimensional scorer.
//!
//! Each dimension reads a disjoint term set so sub-scores stay
//! independent. Matching is case-insensitive substring search.

/// Negative-sentiment / frustration cues (pain intensity).
pub const PAIN_TERMS: &[&str] = &[
    "frustrating",
    "frustrated",
    "annoying",
    "hate",
    "nightmare",
    "painful",
    "tedious",
    "waste of time",
    "wasting time",
    "struggle",
    "struggling",
    "impossible",
    "terrible",
    "awful",
    "fed up",
    "sick of",
    "drives me crazy",
    "can't stand",
];

/// Payment-intent cues (monetization potential).
pub const PAYMENT_TERMS: &[&str] = &[
    "would pay",
    "pay for",
    "paying for",
    "happy to pay",
    "shut up and take my money",
    "subscription",
    "subscribe",
    "per month",
    "/month",
    "pricing",
    "worth paying",
    "spend money",
    "budget for",
    "invoice",
    "charge",
];

/// Existing-solution mentions (market gap, inverse).
pub const COMPETITOR_TERMS: &[&str] = &[
    "i use ",
    "we use ",
    "there's an app",
    "there is an app",
    "already exists",
    "existing tool",
    "alternative",
    "competitor",
    "switched to",
    "works fine",
    "solved this with",
    "just use ",
];

/// Structural / integration complexity cues (feasibility, inverse).
pub const COMPLEXITY_TERMS: &[&str] = &[
    "integration",
    "integrate with",
    "enterprise",
    "compliance",
    "hipaa",
    "gdpr",
    "real-time",
    "realtime",
    "machine learning",
    "blockchain",
    "hardware",
    "regulation",
    "certified",
    "api access",
    "migration",
];

/// Count total occurrences of any term in `text` (already lowercased).
pub fn count_hits(text: &str, terms: &[&str]) -> usize {
    terms
        .iter()
        .map(|term| text.match_indices(term).count())
        .sum()
}
