//! Shared cost ledger for external calls.
//!
//! One ledger per batch, `Arc`-shared between workers. Reservations are
//! made at worst-case cost before a call and settled down to actual cost
//! afterwards, so the batch ceiling holds even under concurrent callers.

use std::collections::HashMap;
use std::sync::Arc;

use common::Error;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Fixed-plus-token cost model for the three external services.
#[derive(Debug, Clone, Deserialize)]
pub struct CostModel {
    pub search_call_usd: f64,
    pub fetch_call_usd: f64,
    pub llm_call_base_usd: f64,
    pub llm_usd_per_1k_tokens: f64,
    /// Token ceiling assumed when reserving for an LLM call.
    pub llm_worst_case_tokens: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            search_call_usd: 0.005,
            fetch_call_usd: 0.002,
            llm_call_base_usd: 0.01,
            llm_usd_per_1k_tokens: 0.012,
            llm_worst_case_tokens: 8_000,
        }
    }
}

impl CostModel {
    pub fn llm_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let tokens = (input_tokens + output_tokens) as f64;
        self.llm_call_base_usd + tokens / 1000.0 * self.llm_usd_per_1k_tokens
    }

    pub fn llm_worst_case_usd(&self) -> f64 {
        self.llm_cost(self.llm_worst_case_tokens, 0)
    }
}

struct LedgerState {
    batch_total_usd: f64,
    per_item_usd: HashMap<String, f64>,
}

#[derive(Clone)]
pub struct CostLedger {
    state: Arc<Mutex<LedgerState>>,
    model: CostModel,
    per_item_ceiling_usd: f64,
    per_batch_ceiling_usd: f64,
}

impl CostLedger {
    pub fn new(
        model: CostModel,
        per_item_ceiling_usd: f64,
        per_batch_ceiling_usd: f64,
    ) -> Result<Self, Error> {
        if per_item_ceiling_usd < 0.0 || per_batch_ceiling_usd < 0.0 {
            return Err(Error::Config("cost ceilings must be non-negative".into()));
        }
        for cost in [
            model.search_call_usd,
            model.fetch_call_usd,
            model.llm_call_base_usd,
            model.llm_usd_per_1k_tokens,
        ] {
            if cost < 0.0 {
                return Err(Error::Config("cost model entries must be non-negative".into()));
            }
        }

        Ok(Self {
            state: Arc::new(Mutex::new(LedgerState {
                batch_total_usd: 0.0,
                per_item_usd: HashMap::new(),
            })),
            model,
            per_item_ceiling_usd,
            per_batch_ceiling_usd,
        })
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    /// Peek whether `worst_case_usd` would fit under both ceilings,
    /// without claiming anything.
    pub async fn can_afford(&self, item_key: &str, worst_case_usd: f64) -> bool {
        let state = self.state.lock().await;
        let item_spent = state.per_item_usd.get(item_key).copied().unwrap_or(0.0);
        state.batch_total_usd + worst_case_usd <= self.per_batch_ceiling_usd
            && item_spent + worst_case_usd <= self.per_item_ceiling_usd
    }

    /// Claim `worst_case_usd` against both ceilings. Returns false (and
    /// claims nothing) when either ceiling would be exceeded.
    pub async fn reserve(&self, item_key: &str, worst_case_usd: f64) -> bool {
        let mut state = self.state.lock().await;
        let item_spent = state.per_item_usd.get(item_key).copied().unwrap_or(0.0);
        if state.batch_total_usd + worst_case_usd > self.per_batch_ceiling_usd
            || item_spent + worst_case_usd > self.per_item_ceiling_usd
        {
            return false;
        }
        state.batch_total_usd += worst_case_usd;
        *state.per_item_usd.entry(item_key.to_string()).or_insert(0.0) += worst_case_usd;
        true
    }

    /// Replace a reservation with the actual cost once the call returns.
    /// Actual cost is capped at the reservation; a call can only settle
    /// down, never up.
    pub async fn settle(&self, item_key: &str, reserved_usd: f64, actual_usd: f64) {
        let refund = (reserved_usd - actual_usd.min(reserved_usd)).max(0.0);
        if refund == 0.0 {
            return;
        }
        let mut state = self.state.lock().await;
        state.batch_total_usd = (state.batch_total_usd - refund).max(0.0);
        if let Some(spent) = state.per_item_usd.get_mut(item_key) {
            *spent = (*spent - refund).max(0.0);
        }
    }

    pub async fn batch_total_usd(&self) -> f64 {
        self.state.lock().await.batch_total_usd
    }

    pub async fn item_total_usd(&self, item_key: &str) -> f64 {
        self.state
            .lock()
            .await
            .per_item_usd
            .get(item_key)
            .copied()
            .unwrap_or(0.0)
    }
}
