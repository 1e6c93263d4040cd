//! Batch orchestrator: score, gate, trust-check, validate and persist
//! each item, continuing past individual failures.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::{
    BatchSummary, ConstraintVerdict, Error, ItemProfile, OpportunityRecord, OpportunityStatus,
    RawItem,
};
use trust_engine::{CommunityStats, ThreadStats};
use validation_engine::MarketValidator;

use crate::journal::{RunEvent, RunJournal};
use crate::store::OpportunityStore;

/// One unit of work from the collection layer: the raw thread plus the
/// profiler's untyped payload and whatever context stats were available.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub item: RawItem,
    pub profile: serde_json::Value,
    #[serde(default)]
    pub community_stats: CommunityStats,
    #[serde(default)]
    pub thread_stats: ThreadStats,
}

pub struct BatchReport {
    pub summary: BatchSummary,
    /// Score-descending, key-ascending. Computed after the batch, so
    /// processing order never affects it.
    pub ranking: Vec<(String, f64)>,
}

enum GateDecision {
    Validate,
    BelowThreshold,
    OutOfBudget,
}

pub struct Pipeline {
    validator: MarketValidator,
    store: OpportunityStore,
    journal: RunJournal,
}

impl Pipeline {
    pub fn new(validator: MarketValidator, store: OpportunityStore, journal: RunJournal) -> Self {
        Self {
            validator,
            store,
            journal,
        }
    }

    pub fn store(&self) -> &OpportunityStore {
        &self.store
    }

    /// Process a batch. `now` is injected so re-scoring an unchanged item
    /// reproduces identical numbers.
    pub async fn run_batch(
        &mut self,
        items: Vec<BatchItem>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let mut summary = BatchSummary {
            total_items: items.len(),
            ..BatchSummary::default()
        };
        let mut score_sum = 0.0;
        let mut scored_count = 0usize;

        self.journal.record(&RunEvent::BatchStart {
            total_items: items.len(),
        });

        for batch_item in items {
            if cancel.is_cancelled() {
                warn!("batch cancelled, stopping before next item");
                self.journal.record(&RunEvent::BatchCancelled);
                break;
            }

            let key = batch_item.item.identity_key();
            match self.process_item(&batch_item, now, cancel).await {
                Ok(record) => {
                    score_sum += record.scores.total_score;
                    scored_count += 1;
                    match record.status {
                        OpportunityStatus::Disqualified => summary.disqualified += 1,
                        OpportunityStatus::Validated => {
                            summary.approved += 1;
                            summary.validated += 1;
                        }
                        _ => summary.approved += 1,
                    }
                    // Persistence failures are fatal to the batch.
                    self.store.upsert(&record)?;
                }
                Err(e) => {
                    summary.errored += 1;
                    error!(key, error = %e, "item failed, continuing batch");
                    self.journal.record(&RunEvent::ItemError {
                        key: key.clone(),
                        error: e.to_string(),
                    });
                    self.store.record_error(&key, &batch_item.item, &e.to_string())?;
                }
            }
        }

        summary.total_cost_usd = self.validator.ledger().batch_total_usd().await;
        summary.avg_score = if scored_count > 0 {
            score_sum / scored_count as f64
        } else {
            0.0
        };

        self.journal.record(&RunEvent::BatchSummary(summary.clone()));

        let ranking = self.store.ranked()?;
        Ok(BatchReport { summary, ranking })
    }

    async fn process_item(
        &mut self,
        batch_item: &BatchItem,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> std::result::Result<OpportunityRecord, Error> {
        let item = &batch_item.item;
        let key = item.identity_key();

        let scores = scoring_engine::score(item, now);
        let profile = ItemProfile::from_value(&batch_item.profile).map_err(|e| {
            Error::ItemProcessing {
                key: key.clone(),
                message: e.to_string(),
            }
        })?;
        let verdict = scoring_engine::evaluate_functions(&profile);
        let trust = trust_engine::validate(
            item,
            Some(&profile),
            &batch_item.community_stats,
            &batch_item.thread_stats,
        );

        let adjusted = scoring_engine::adjusted_total(&scores, &verdict);

        if verdict.is_disqualified {
            info!(key, reason = ?verdict.violation_reason, "item disqualified");
            self.journal.record(&RunEvent::ItemDisqualified {
                key: key.clone(),
                reason: verdict.violation_reason.clone(),
                adjusted_total: adjusted,
            });
            return Ok(OpportunityRecord {
                key,
                item: item.clone(),
                scores,
                verdict,
                trust,
                evidence: None,
                status: OpportunityStatus::Disqualified,
            });
        }

        let (status, evidence) = match self.gate(&key, &verdict, scores.total_score).await {
            GateDecision::Validate => {
                self.journal.record(&RunEvent::ValidationRequested {
                    key: key.clone(),
                    total_score: scores.total_score,
                });
                let report = self.validator.synthesize(item, &profile, now, cancel).await;
                for source in &report.source_failures {
                    self.journal.record(&RunEvent::ValidationError {
                        key: key.clone(),
                        source: source.clone(),
                    });
                }
                if report.budget_stopped {
                    self.journal
                        .record(&RunEvent::BudgetExhausted { key: key.clone() });
                }
                self.journal.record(&RunEvent::ItemValidated {
                    key: key.clone(),
                    validation_score: report.evidence.validation_score,
                    data_quality_score: report.evidence.data_quality_score,
                    cost_usd: report.evidence.total_cost_usd,
                });
                (OpportunityStatus::Validated, Some(report.evidence))
            }
            decision => {
                if matches!(decision, GateDecision::OutOfBudget) {
                    self.journal
                        .record(&RunEvent::BudgetExhausted { key: key.clone() });
                }
                self.journal.record(&RunEvent::ItemScored {
                    key: key.clone(),
                    total_score: scores.total_score,
                    adjusted_total: adjusted,
                });
                (OpportunityStatus::Scored, None)
            }
        };

        Ok(OpportunityRecord {
            key,
            item: item.clone(),
            scores,
            verdict,
            trust,
            evidence,
            status,
        })
    }

    /// C5 entry gate: approved, above threshold, and enough budget left
    /// for at least the first external call.
    async fn gate(&self, key: &str, verdict: &ConstraintVerdict, total: f64) -> GateDecision {
        if verdict.is_disqualified || total < self.validator.threshold() {
            return GateDecision::BelowThreshold;
        }
        let first_call = self.validator.ledger().model().search_call_usd;
        if !self.validator.ledger().can_afford(key, first_call).await {
            warn!(key, "validation skipped: cost budget exhausted");
            return GateDecision::OutOfBudget;
        }
        GateDecision::Validate
    }
}
