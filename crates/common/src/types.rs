//! Core data model: raw inputs, score structures, verdicts and the
//! persisted opportunity record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single source discussion thread, as delivered by the collection
/// layer. Never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub community: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

impl RawItem {
    /// Stable identity key for idempotent upserts across re-runs.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.community, self.id)
    }
}

/// Fixed weights for the five scoring dimensions, in declaration order:
/// market_demand, pain_intensity, monetization_potential, market_gap,
/// technical_feasibility. Sum to 1.0.
pub const DIMENSION_WEIGHTS: [f64; 5] = [0.20, 0.25, 0.30, 0.15, 0.10];

/// Fixed weights for the six trust dimensions, in declaration order:
/// subreddit_activity, post_engagement, trend_velocity, problem_validity,
/// discussion_quality, ai_confidence. Sum to 1.0.
pub const TRUST_WEIGHTS: [f64; 6] = [0.25, 0.20, 0.15, 0.15, 0.15, 0.10];

/// Five independent 0-100 sub-scores plus their weighted total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub market_demand: f64,
    pub pain_intensity: f64,
    pub monetization_potential: f64,
    pub market_gap: f64,
    pub technical_feasibility: f64,
    pub total_score: f64,
}

impl DimensionScores {
    /// Build from the five sub-scores, clamping each to [0,100] and
    /// computing the fixed-weight total.
    pub fn from_parts(
        market_demand: f64,
        pain_intensity: f64,
        monetization_potential: f64,
        market_gap: f64,
        technical_feasibility: f64,
    ) -> Self {
        let clamped = [
            market_demand.clamp(0.0, 100.0),
            pain_intensity.clamp(0.0, 100.0),
            monetization_potential.clamp(0.0, 100.0),
            market_gap.clamp(0.0, 100.0),
            technical_feasibility.clamp(0.0, 100.0),
        ];
        let total_score = clamped
            .iter()
            .zip(DIMENSION_WEIGHTS.iter())
            .map(|(s, w)| s * w)
            .sum::<f64>();

        Self {
            market_demand: clamped[0],
            pain_intensity: clamped[1],
            monetization_potential: clamped[2],
            market_gap: clamped[3],
            technical_feasibility: clamped[4],
            total_score,
        }
    }
}

/// Outcome of the simplicity constraint check. A first-class verdict,
/// not an error: DISQUALIFIED items are still persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintVerdict {
    pub is_disqualified: bool,
    pub violation_reason: Option<String>,
    pub simplicity_score: u8,
}

/// Credibility banding derived from the overall trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            TrustLevel::VeryHigh
        } else if score >= 65.0 {
            TrustLevel::High
        } else if score >= 40.0 {
            TrustLevel::Medium
        } else {
            TrustLevel::Low
        }
    }
}

/// Six credibility sub-scores with their weighted total, band and badges.
/// Computed once per item+profile pair; immutable unless recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustIndicators {
    pub subreddit_activity: f64,
    pub post_engagement: f64,
    pub trend_velocity: f64,
    pub problem_validity: f64,
    pub discussion_quality: f64,
    pub ai_confidence: f64,
    pub overall_trust_score: f64,
    pub trust_level: TrustLevel,
    pub badges: Vec<String>,
}

/// A competitor with observed pricing, extracted from one source page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorPricing {
    pub name: String,
    pub price_points_usd: Vec<f64>,
    pub pricing_model: Option<String>,
    pub source_url: String,
    pub confidence: f64,
}

/// TAM/SAM estimate pulled from a market-research source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSizeEstimate {
    pub tam_usd: Option<f64>,
    pub sam_usd: Option<f64>,
    pub growth_rate_pct: Option<f64>,
    pub source_url: String,
    pub confidence: f64,
}

/// A comparable product launch with its engagement numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarLaunch {
    pub name: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub pricing_mention: Option<String>,
    pub source_url: String,
}

/// Externally gathered market evidence for one validated opportunity.
/// Immutable after creation; re-validation appends a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEvidence {
    pub competitors: Vec<CompetitorPricing>,
    pub market_size: Option<MarketSizeEstimate>,
    pub launches: Vec<SimilarLaunch>,
    pub validation_score: f64,
    pub data_quality_score: f64,
    pub total_cost_usd: f64,
    pub reasoning: String,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Scored,
    Disqualified,
    Validated,
    Error,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Scored => "scored",
            OpportunityStatus::Disqualified => "disqualified",
            OpportunityStatus::Validated => "validated",
            OpportunityStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scored" => Some(OpportunityStatus::Scored),
            "disqualified" => Some(OpportunityStatus::Disqualified),
            "validated" => Some(OpportunityStatus::Validated),
            "error" => Some(OpportunityStatus::Error),
            _ => None,
        }
    }
}

/// The unit of persistence, keyed by `RawItem::identity_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub key: String,
    pub item: RawItem,
    pub scores: DimensionScores,
    pub verdict: ConstraintVerdict,
    pub trust: TrustIndicators,
    pub evidence: Option<ValidationEvidence>,
    pub status: OpportunityStatus,
}

/// Per-batch accounting reported to callers. `errored` counts items that
/// failed to process, distinct from `disqualified` (processed and
/// rejected by the business rule).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_items: usize,
    pub approved: usize,
    pub disqualified: usize,
    pub validated: usize,
    pub errored: usize,
    pub total_cost_usd: f64,
    pub avg_score: f64,
}
