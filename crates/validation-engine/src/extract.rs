//! Typed facts pulled out of one source page by the LLM, plus their
//! post-parse validation. Conversions into the persisted evidence types
//! attach the source URL the facts came from.

use common::{CompetitorPricing, Error, MarketSizeEstimate, SimilarLaunch};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceFacts {
    pub competitors: Vec<ExtractedCompetitor>,
    pub market_size: Option<ExtractedMarketSize>,
    pub launches: Vec<ExtractedLaunch>,
    /// Days since the source was published, when the page states it.
    pub source_age_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedCompetitor {
    pub name: String,
    pub price_points_usd: Vec<f64>,
    pub pricing_model: Option<String>,
    /// Extraction confidence in [0,1].
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedMarketSize {
    pub tam_usd: Option<f64>,
    pub sam_usd: Option<f64>,
    pub growth_rate_pct: Option<f64>,
    /// Extraction confidence in [0,1].
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedLaunch {
    pub name: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub pricing_mention: Option<String>,
}

/// Range checks the schema cannot express. Violations mean the source is
/// skipped, not that synthesis aborts.
pub fn validate_facts(facts: &SourceFacts) -> Result<(), Error> {
    for competitor in &facts.competitors {
        if competitor.name.trim().is_empty() {
            return Err(Error::Extraction("competitor with empty name".into()));
        }
        if !(0.0..=1.0).contains(&competitor.confidence) {
            return Err(Error::Extraction(format!(
                "competitor confidence out of range: {}",
                competitor.confidence
            )));
        }
        if competitor.price_points_usd.iter().any(|p| *p < 0.0) {
            return Err(Error::Extraction(format!(
                "negative price point for {}",
                competitor.name
            )));
        }
    }

    if let Some(size) = &facts.market_size {
        if !(0.0..=1.0).contains(&size.confidence) {
            return Err(Error::Extraction(format!(
                "market-size confidence out of range: {}",
                size.confidence
            )));
        }
        if size.tam_usd.is_some_and(|v| v < 0.0) || size.sam_usd.is_some_and(|v| v < 0.0) {
            return Err(Error::Extraction("negative market-size figure".into()));
        }
    }

    Ok(())
}

impl SourceFacts {
    pub fn competitors_for(&self, source_url: &str) -> Vec<CompetitorPricing> {
        self.competitors
            .iter()
            .map(|c| CompetitorPricing {
                name: c.name.clone(),
                price_points_usd: c.price_points_usd.clone(),
                pricing_model: c.pricing_model.clone(),
                source_url: source_url.to_string(),
                confidence: c.confidence,
            })
            .collect()
    }

    pub fn market_size_for(&self, source_url: &str) -> Option<MarketSizeEstimate> {
        self.market_size.as_ref().map(|m| MarketSizeEstimate {
            tam_usd: m.tam_usd,
            sam_usd: m.sam_usd,
            growth_rate_pct: m.growth_rate_pct,
            source_url: source_url.to_string(),
            confidence: m.confidence,
        })
    }

    pub fn launches_for(&self, source_url: &str) -> Vec<SimilarLaunch> {
        self.launches
            .iter()
            .map(|l| SimilarLaunch {
                name: l.name.clone(),
                upvotes: l.upvotes,
                comment_count: l.comment_count,
                pricing_mention: l.pricing_mention.clone(),
                source_url: source_url.to_string(),
            })
            .collect()
    }
}
