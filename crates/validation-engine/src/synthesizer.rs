//! Market evidence synthesizer.
//!
//! Derives search queries from an item's concept, walks
//! search -> fetch -> extract per source, and fuses whatever survived
//! into a `ValidationEvidence`. Per-source failures are collected, not
//! propagated: evidence from n-1 sources beats aborting the synthesis.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CompetitorPricing, Error, ItemProfile, MarketSizeEstimate, RawItem, SimilarLaunch, ValidationEvidence};
use llm_client::LlmClient;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use web_client::WebClient;

use crate::extract::{validate_facts, SourceFacts};
use crate::ledger::CostLedger;

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Minimum `total_score` before an item is worth external validation.
    pub validation_threshold: f64,
    pub max_queries: usize,
    pub results_per_query: usize,
    pub max_sources: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validation_threshold: 60.0,
            max_queries: 3,
            results_per_query: 5,
            max_sources: 4,
        }
    }
}

struct SourceOutcome {
    url: String,
    facts: SourceFacts,
}

struct SourceFailure {
    url: String,
    error: Error,
}

/// Synthesis result plus the control-flow facts the orchestrator journals:
/// which sources failed, and whether the run was cut short by budget or
/// cancellation.
pub struct SynthesisReport {
    pub evidence: ValidationEvidence,
    pub source_failures: Vec<String>,
    pub budget_stopped: bool,
    pub cancelled: bool,
}

pub struct MarketValidator {
    web: Arc<WebClient>,
    llm: Arc<LlmClient>,
    ledger: CostLedger,
    config: ValidationConfig,
}

impl MarketValidator {
    pub fn new(
        web: Arc<WebClient>,
        llm: Arc<LlmClient>,
        ledger: CostLedger,
        config: ValidationConfig,
    ) -> Self {
        Self {
            web,
            llm,
            ledger,
            config,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.config.validation_threshold
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    /// Gather and fuse market evidence for one approved item. Always
    /// returns evidence; thin or empty results show up as low scores and
    /// an explanatory `reasoning`, never as an error.
    pub async fn synthesize(
        &self,
        item: &RawItem,
        profile: &ItemProfile,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> SynthesisReport {
        let key = item.identity_key();
        let concept = if profile.problem_description.is_empty() {
            item.title.as_str()
        } else {
            profile.problem_description.as_str()
        };

        let mut budget_stopped = false;
        let mut cancelled = false;
        let mut sources: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        for query in derive_queries(concept, self.config.max_queries) {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let search_cost = self.ledger.model().search_call_usd;
            if !self.ledger.reserve(&key, search_cost).await {
                budget_stopped = true;
                break;
            }

            match self.web.search(&query, self.config.results_per_query).await {
                Ok(results) => {
                    for result in results {
                        if seen.insert(result.url.clone()) {
                            sources.push(result.url);
                        }
                    }
                }
                Err(e) => {
                    warn!(query, error = %e, "search failed, continuing with other queries");
                }
            }
        }
        sources.truncate(self.config.max_sources);

        let mut outcomes: Vec<Result<SourceOutcome, SourceFailure>> = Vec::new();
        for url in sources {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if budget_stopped {
                break;
            }
            match self.process_source(&key, &url, cancel).await {
                Ok(Some(outcome)) => outcomes.push(Ok(outcome)),
                Ok(None) => {
                    if cancel.is_cancelled() {
                        cancelled = true;
                    } else {
                        budget_stopped = true;
                    }
                    break;
                }
                Err(error) => outcomes.push(Err(SourceFailure { url, error })),
            }
        }

        let attempted = outcomes.len();
        let mut competitors: Vec<CompetitorPricing> = Vec::new();
        let mut market_size: Option<MarketSizeEstimate> = None;
        let mut launches: Vec<SimilarLaunch> = Vec::new();
        let mut confidences: Vec<f64> = Vec::new();
        let mut ages: Vec<f64> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for outcome in outcomes {
            match outcome {
                Ok(SourceOutcome { url, facts }) => {
                    competitors.extend(facts.competitors_for(&url));
                    launches.extend(facts.launches_for(&url));
                    if let Some(size) = facts.market_size_for(&url) {
                        // Keep the most confident estimate.
                        if market_size.as_ref().is_none_or(|m| size.confidence > m.confidence) {
                            market_size = Some(size);
                        }
                    }
                    confidences.extend(facts.competitors.iter().map(|c| c.confidence));
                    if let Some(size) = &facts.market_size {
                        confidences.push(size.confidence);
                    }
                    if let Some(age) = facts.source_age_days {
                        ages.push(f64::from(age));
                    }
                }
                Err(failure) => {
                    failures.push(format!("{}: {}", failure.url, failure.error));
                }
            }
        }

        let succeeded = attempted - failures.len();
        let data_quality_score = fuse_data_quality(
            succeeded,
            self.config.max_sources,
            mean(&confidences),
            mean(&ages),
        );
        let validation_score =
            fuse_validation_score(&competitors, market_size.as_ref(), &launches, data_quality_score);

        let mut reasoning = format!(
            "{succeeded}/{attempted} sources yielded evidence: {} competitor(s), {} launch(es), market size {}",
            competitors.len(),
            launches.len(),
            if market_size.is_some() { "found" } else { "not found" },
        );
        if !failures.is_empty() {
            reasoning.push_str(&format!("; failed sources: {}", failures.join(", ")));
        }
        if budget_stopped {
            reasoning.push_str("; stopped early: cost budget exhausted");
        }
        if cancelled {
            reasoning.push_str("; stopped early: batch cancelled");
        }

        let total_cost_usd = self.ledger.item_total_usd(&key).await;
        info!(
            key,
            validation_score,
            data_quality_score,
            total_cost_usd,
            "evidence synthesis complete"
        );

        SynthesisReport {
            evidence: ValidationEvidence {
                competitors,
                market_size,
                launches,
                validation_score,
                data_quality_score,
                total_cost_usd,
                reasoning,
                collected_at: now,
            },
            source_failures: failures,
            budget_stopped,
            cancelled,
        }
    }

    /// Fetch one source and run the structured extraction over it.
    /// `Ok(None)` means the caller should stop issuing external calls:
    /// the budget no longer covers the next call's worst case, or the
    /// batch was cancelled.
    async fn process_source(
        &self,
        key: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SourceOutcome>, Error> {
        let fetch_cost = self.ledger.model().fetch_call_usd;
        if cancel.is_cancelled() || !self.ledger.reserve(key, fetch_cost).await {
            return Ok(None);
        }
        let page = self.web.fetch(url).await?;

        let llm_worst_case = self.ledger.model().llm_worst_case_usd();
        if cancel.is_cancelled() || !self.ledger.reserve(key, llm_worst_case).await {
            return Ok(None);
        }

        let payload = json!({
            "source_url": url,
            "word_count": page.word_count,
            "content": page.content,
        });
        let extraction = self
            .llm
            .extract::<SourceFacts>("extract_market_facts", &payload)
            .await;

        match extraction {
            Ok(extraction) => {
                let actual = self
                    .ledger
                    .model()
                    .llm_cost(extraction.input_tokens, extraction.output_tokens);
                self.ledger.settle(key, llm_worst_case, actual).await;

                validate_facts(&extraction.value)?;
                debug!(url, "source extraction accepted");
                Ok(Some(SourceOutcome {
                    url: url.to_string(),
                    facts: extraction.value,
                }))
            }
            Err(e) => {
                // The call was made; keep the worst-case charge.
                Err(Error::Extraction(e.to_string()))
            }
        }
    }
}

/// Up to `max_queries` searches per item, each probing a different
/// evidence class (competitors, market size, launches).
pub fn derive_queries(concept: &str, max_queries: usize) -> Vec<String> {
    let concept = concept.split_whitespace().take(8).collect::<Vec<_>>().join(" ");
    let all = [
        format!("{concept} alternatives pricing"),
        format!("{concept} market size TAM"),
        format!("{concept} product launch"),
    ];
    all.into_iter().take(max_queries).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Source coverage, extraction confidence and recency, each capped.
fn fuse_data_quality(
    succeeded: usize,
    max_sources: usize,
    mean_confidence: Option<f64>,
    mean_age_days: Option<f64>,
) -> f64 {
    if succeeded == 0 {
        return 0.0;
    }
    let coverage = (succeeded as f64 / max_sources.max(1) as f64).min(1.0) * 40.0;
    let confidence = mean_confidence.unwrap_or(0.0).clamp(0.0, 1.0) * 40.0;
    // Unknown recency is treated as middling, not as fresh.
    let recency = mean_age_days.map_or(0.5, |d| (1.0 - d / 365.0).clamp(0.0, 1.0)) * 20.0;
    (coverage + confidence + recency).min(100.0)
}

/// Evidence-strength banding. A confirmed-pricing competitor plus a
/// plausible market-size figure lands in the moderate-to-strong band;
/// no evidence at all stays low regardless of the dimensional score.
fn fuse_validation_score(
    competitors: &[CompetitorPricing],
    market_size: Option<&MarketSizeEstimate>,
    launches: &[SimilarLaunch],
    data_quality: f64,
) -> f64 {
    if competitors.is_empty() && market_size.is_none() && launches.is_empty() {
        return (data_quality * 0.2).min(20.0);
    }

    let priced_competitor = competitors
        .iter()
        .any(|c| !c.price_points_usd.is_empty() && c.confidence >= 0.5);
    let plausible_size = market_size
        .is_some_and(|m| m.tam_usd.unwrap_or(0.0) > 0.0 && m.confidence >= 0.4);

    let mut score = 20.0;
    if priced_competitor {
        score += 25.0;
    } else if !competitors.is_empty() {
        score += 10.0;
    }
    if plausible_size {
        score += 20.0;
    }
    if !launches.is_empty() {
        score += 10.0;
    }
    (score + data_quality * 0.25).min(95.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced_competitor() -> CompetitorPricing {
        CompetitorPricing {
            name: "Acme".into(),
            price_points_usd: vec![29.0],
            pricing_model: Some("subscription".into()),
            source_url: "https://a".into(),
            confidence: 0.8,
        }
    }

    fn plausible_size() -> MarketSizeEstimate {
        MarketSizeEstimate {
            tam_usd: Some(1.0e9),
            sam_usd: None,
            growth_rate_pct: Some(10.0),
            source_url: "https://b".into(),
            confidence: 0.7,
        }
    }

    #[test]
    fn zero_evidence_scores_low_without_erroring() {
        let quality = fuse_data_quality(0, 4, None, None);
        assert_eq!(quality, 0.0);
        let score = fuse_validation_score(&[], None, &[], quality);
        assert!(score <= 20.0);
    }

    #[test]
    fn priced_competitor_and_market_size_reach_moderate_band() {
        let quality = fuse_data_quality(3, 4, Some(0.75), Some(60.0));
        let score = fuse_validation_score(
            &[priced_competitor()],
            Some(&plausible_size()),
            &[],
            quality,
        );
        assert!(score >= 65.0, "expected moderate-to-strong, got {score}");
        assert!(score <= 95.0);
    }

    #[test]
    fn unpriced_competitors_score_below_priced_ones() {
        let mut unpriced = priced_competitor();
        unpriced.price_points_usd.clear();
        let quality = 50.0;
        let low = fuse_validation_score(&[unpriced], None, &[], quality);
        let high = fuse_validation_score(&[priced_competitor()], None, &[], quality);
        assert!(low < high);
    }

    #[test]
    fn data_quality_reflects_coverage_and_recency() {
        let fresh = fuse_data_quality(4, 4, Some(0.9), Some(30.0));
        let stale = fuse_data_quality(1, 4, Some(0.3), Some(400.0));
        assert!(fresh > stale);
        assert!((0.0..=100.0).contains(&fresh));
        assert!((0.0..=100.0).contains(&stale));
    }

    #[test]
    fn queries_cover_distinct_evidence_classes() {
        let queries = derive_queries("expense tracking for freelancers", 3);
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("pricing"));
        assert!(queries[1].contains("market size"));
        assert!(queries[2].contains("launch"));
    }

    #[test]
    fn long_concepts_are_trimmed_in_queries() {
        let concept = "one two three four five six seven eight nine ten";
        let queries = derive_queries(concept, 1);
        assert!(!queries[0].contains("nine"));
    }
}
