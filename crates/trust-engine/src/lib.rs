//! Credibility scoring across six dimensions.
//!
//! Pure and total: missing inputs degrade the affected sub-score to 0
//! instead of erroring, so a thin profile still yields a (low) trust
//! signal and never blocks the pipeline.

use common::{ItemProfile, RawItem, TrustIndicators, TrustLevel, TRUST_WEIGHTS};
use serde::{Deserialize, Serialize};

/// Community-level signals from the collection layer. All optional;
/// whatever is absent simply contributes nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityStats {
    pub subscribers: Option<i64>,
    pub posts_per_day: Option<f64>,
    pub weekly_growth_pct: Option<f64>,
}

/// Comment-thread shape for the item under scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadStats {
    pub top_level_comments: Option<i64>,
    pub max_depth: Option<i64>,
    pub substantive_replies: Option<i64>,
}

const VAGUE_MARKERS: &[&str] = &[
    "maybe", "somehow", "stuff", "things", "kind of", "sort of", "not sure", "i guess",
];

const CONCRETE_MARKERS: &[&str] = &[
    "every time",
    "each time",
    "when i",
    "whenever",
    "takes me",
    "hours",
    "minutes",
    "per week",
    "per day",
    "spreadsheet",
    "manually",
];

/// Compute the six trust sub-scores and their weighted overall.
pub fn validate(
    item: &RawItem,
    profile: Option<&ItemProfile>,
    community: &CommunityStats,
    thread: &ThreadStats,
) -> TrustIndicators {
    let subreddit_activity = subreddit_activity(community);
    let post_engagement = post_engagement(item, community);
    let trend_velocity = trend_velocity(community);
    let problem_validity = problem_validity(profile);
    let discussion_quality = discussion_quality(thread);
    let ai_confidence = profile.map_or(0.0, |p| (p.confidence * 100.0).clamp(0.0, 100.0));

    let subs = [
        subreddit_activity,
        post_engagement,
        trend_velocity,
        problem_validity,
        discussion_quality,
        ai_confidence,
    ];
    let overall_trust_score = subs
        .iter()
        .zip(TRUST_WEIGHTS.iter())
        .map(|(s, w)| s * w)
        .sum::<f64>();

    TrustIndicators {
        subreddit_activity,
        post_engagement,
        trend_velocity,
        problem_validity,
        discussion_quality,
        ai_confidence,
        overall_trust_score,
        trust_level: TrustLevel::from_score(overall_trust_score),
        badges: badges(&subs),
    }
}

/// Posting cadence plus community size.
fn subreddit_activity(community: &CommunityStats) -> f64 {
    let cadence = community
        .posts_per_day
        .map_or(0.0, |p| (p.max(0.0) / 200.0 * 60.0).min(60.0));
    let size = community
        .subscribers
        .map_or(0.0, |s| ((s.max(0) as f64).ln_1p() / 5_000_000f64.ln_1p() * 40.0).min(40.0));
    cadence + size
}

/// Upvote/comment volume normalized by community size. Without a
/// subscriber count there is no meaningful normalization, so 0.
fn post_engagement(item: &RawItem, community: &CommunityStats) -> f64 {
    let Some(subscribers) = community.subscribers.filter(|s| *s > 0) else {
        return 0.0;
    };
    let engagement = (item.upvotes.max(0) + 2 * item.comment_count.max(0)) as f64;
    let per_thousand = engagement / (subscribers as f64 / 1000.0).max(1.0);
    (per_thousand * 10.0).min(100.0)
}

/// Recent-growth rate over the rolling window the collector maintains.
fn trend_velocity(community: &CommunityStats) -> f64 {
    community
        .weekly_growth_pct
        .map_or(0.0, |g| (g.max(0.0) * 2.0).min(100.0))
}

/// Concrete problem language scores above vague phrasing.
fn problem_validity(profile: Option<&ItemProfile>) -> f64 {
    let Some(profile) = profile else { return 0.0 };
    let description = profile.problem_description.to_lowercase();
    if description.is_empty() {
        return 0.0;
    }

    let concrete = CONCRETE_MARKERS
        .iter()
        .filter(|m| description.contains(*m))
        .count() as f64;
    let vague = VAGUE_MARKERS
        .iter()
        .filter(|m| description.contains(*m))
        .count() as f64;

    (50.0 + concrete * 12.0 - vague * 15.0).clamp(0.0, 100.0)
}

/// Thread depth and substantive-reply ratio.
fn discussion_quality(thread: &ThreadStats) -> f64 {
    let (Some(top_level), Some(depth)) = (thread.top_level_comments, thread.max_depth) else {
        return 0.0;
    };
    if top_level <= 0 {
        return 0.0;
    }

    let depth_score = (depth.max(0) as f64 * 10.0).min(40.0);
    let substantive_ratio = thread
        .substantive_replies
        .map_or(0.0, |s| (s.max(0) as f64 / top_level as f64).min(1.0));
    depth_score + substantive_ratio * 60.0
}

/// Independent per-dimension threshold checks; any subset may co-occur.
fn badges(subs: &[f64; 6]) -> Vec<String> {
    const RULES: [(usize, f64, &str); 6] = [
        (0, 80.0, "highly-active-community"),
        (1, 75.0, "strong-engagement"),
        (2, 70.0, "trending"),
        (3, 80.0, "well-articulated-problem"),
        (4, 75.0, "substantive-discussion"),
        (5, 90.0, "high-ai-confidence"),
    ];

    RULES
        .iter()
        .filter(|(idx, threshold, _)| subs[*idx] >= *threshold)
        .map(|(_, _, name)| (*name).to_string())
        .collect()
}
