//! Five-dimension opportunity scorer.
//!
//! Pure function of the raw item and an injected `now` (used only for
//! engagement velocity), so re-scoring an unchanged item reproduces the
//! exact same numbers.

use chrono::{DateTime, Utc};
use common::{DimensionScores, RawItem};

use crate::lexicon;

/// Score one item across the five dimensions.
pub fn score(item: &RawItem, now: DateTime<Utc>) -> DimensionScores {
    let text = format!("{} {}", item.title, item.body).to_lowercase();
    let words = text.split_whitespace().count().max(1);

    DimensionScores::from_parts(
        market_demand(item, now),
        lexical_density_score(&text, words, lexicon::PAIN_TERMS, 18.0),
        lexical_density_score(&text, words, lexicon::PAYMENT_TERMS, 22.0),
        market_gap(&text),
        technical_feasibility(&text),
    )
}

/// Engagement magnitude blended with velocity. Comments weigh double:
/// discussion is a stronger demand signal than a drive-by upvote.
fn market_demand(item: &RawItem, now: DateTime<Utc>) -> f64 {
    let engagement = (item.upvotes.max(0) + 2 * item.comment_count.max(0)) as f64;
    let magnitude = (engagement.ln_1p() / 10_000f64.ln_1p() * 100.0).min(100.0);

    let age_hours = (now - item.created_at).num_minutes().max(60) as f64 / 60.0;
    let per_hour = engagement / age_hours;
    let velocity = (per_hour / 50.0 * 100.0).min(100.0);

    0.6 * magnitude + 0.4 * velocity
}

/// Hits per 100 words of the given lexicon, scaled into [0,100].
fn lexical_density_score(text: &str, words: usize, terms: &[&str], scale: f64) -> f64 {
    let hits = lexicon::count_hits(text, terms) as f64;
    let per_100_words = hits / words as f64 * 100.0;
    (per_100_words * scale).min(100.0)
}

/// Inverse of competitor-mention count: fewer adequate existing solutions
/// means a wider gap. Never reaches 100 on zero mentions, since silence is
/// weak evidence.
fn market_gap(text: &str) -> f64 {
    let mentions = lexicon::count_hits(text, lexicon::COMPETITOR_TERMS) as f64;
    (95.0 - mentions * 22.0).clamp(5.0, 95.0)
}

/// Inverse of complexity-cue density: more integration/regulatory cues
/// means harder to build.
fn technical_feasibility(text: &str) -> f64 {
    let cues = lexicon::count_hits(text, lexicon::COMPLEXITY_TERMS) as f64;
    (90.0 - cues * 18.0).clamp(5.0, 90.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str, body: &str, upvotes: i64, comments: i64) -> RawItem {
        RawItem {
            id: "t1".into(),
            title: title.into(),
            body: body.into(),
            community: "startups".into(),
            upvotes,
            comment_count: comments,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn scoring_is_deterministic() {
        let it = item(
            "Expense tracking is frustrating",
            "I would pay for something simpler. Integration with banks is a nightmare.",
            412,
            96,
        );
        let a = score(&it, fixed_now());
        let b = score(&it, fixed_now());
        assert_eq!(a, b);
        // Byte-identical through serialization too.
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn all_scores_within_range() {
        let noisy = item(
            &"frustrating would pay ".repeat(200),
            &"integration alternative ".repeat(200),
            1_000_000,
            500_000,
        );
        let s = score(&noisy, fixed_now());
        for v in [
            s.market_demand,
            s.pain_intensity,
            s.monetization_potential,
            s.market_gap,
            s.technical_feasibility,
            s.total_score,
        ] {
            assert!((0.0..=100.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn pain_terms_raise_pain_not_monetization() {
        let painful = item("ugh", "this is frustrating and tedious, a real nightmare", 10, 2);
        let neutral = item("ugh", "this is a description of a mild workflow detail", 10, 2);
        let sp = score(&painful, fixed_now());
        let sn = score(&neutral, fixed_now());
        assert!(sp.pain_intensity > sn.pain_intensity);
        assert_eq!(sp.monetization_potential, sn.monetization_potential);
    }

    #[test]
    fn competitor_mentions_lower_the_gap() {
        let crowded = item(
            "tools",
            "i use notion, switched to airtable, there's an app for it, already exists",
            10,
            2,
        );
        let open = item("tools", "nothing out there does this", 10, 2);
        assert!(score(&crowded, fixed_now()).market_gap < score(&open, fixed_now()).market_gap);
    }

    #[test]
    fn complexity_cues_lower_feasibility() {
        let heavy = item(
            "idea",
            "needs hipaa compliance, enterprise integration and real-time machine learning",
            10,
            2,
        );
        let light = item("idea", "a simple checklist", 10, 2);
        assert!(
            score(&heavy, fixed_now()).technical_feasibility
                < score(&light, fixed_now()).technical_feasibility
        );
    }

    #[test]
    fn engagement_raises_demand() {
        let hot = item("a", "b", 5000, 900);
        let cold = item("a", "b", 2, 0);
        assert!(score(&hot, fixed_now()).market_demand > score(&cold, fixed_now()).market_demand);
    }
}
