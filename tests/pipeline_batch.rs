//! Batch orchestration tests: status accounting, idempotent re-runs,
//! ranking and cancellation. The cost ledger is given a zero budget so
//! the validation gate closes before any external call is attempted.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::OpportunityStatus;
use llm_client::LlmClient;
use opportunity_bot::journal::RunJournal;
use opportunity_bot::pipeline::{BatchItem, Pipeline};
use opportunity_bot::store::OpportunityStore;
use validation_engine::{CostLedger, CostModel, MarketValidator, ValidationConfig};
use web_client::{WebClient, WebClientConfig};

fn pipeline(journal_dir: &TempDir) -> Pipeline {
    let web = Arc::new(WebClient::new(WebClientConfig::default()).unwrap());
    let llm = Arc::new(LlmClient::new("test-key".into(), "test-model".into(), 1_000, 0).unwrap());
    let ledger = CostLedger::new(CostModel::default(), 0.0, 0.0).unwrap();
    let validator = MarketValidator::new(web, llm, ledger, ValidationConfig::default());
    Pipeline::new(
        validator,
        OpportunityStore::open_in_memory().unwrap(),
        RunJournal::open(journal_dir.path().join("journal")).unwrap(),
    )
}

fn batch_item(id: &str, functions: &[&str], upvotes: i64) -> BatchItem {
    BatchItem {
        item: common::RawItem {
            id: id.to_string(),
            title: "Expense tracking is frustrating".into(),
            body: "I would pay for something simpler, manual reconciliation is a nightmare".into(),
            community: "startups".into(),
            upvotes,
            comment_count: 40,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        },
        profile: json!({
            "functions": functions,
            "problem_description": "manual expense reconciliation takes me hours per week",
            "confidence": 0.9,
        }),
        community_stats: Default::default(),
        thread_stats: Default::default(),
    }
}

fn malformed_item(id: &str) -> BatchItem {
    let mut item = batch_item(id, &["x"], 5);
    item.profile = json!({"confidence": 0.4});
    item
}

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn mixed_batch_reports_each_status_separately() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline(&dir);
    let items = vec![
        batch_item("ok", &["tracker"], 300),
        batch_item("complex", &["a", "b", "c", "d"], 300),
        malformed_item("broken"),
    ];

    let cancel = CancellationToken::new();
    let report = pipeline.run_batch(items, fixed_now(), &cancel).await.unwrap();

    assert_eq!(report.summary.total_items, 3);
    assert_eq!(report.summary.approved, 1);
    assert_eq!(report.summary.disqualified, 1);
    assert_eq!(report.summary.errored, 1);
    assert_eq!(report.summary.validated, 0);
    assert_eq!(report.summary.total_cost_usd, 0.0);

    // All three rows persisted, but error rows stay out of the ranking.
    assert_eq!(pipeline.store().row_count().unwrap(), 3);
    assert_eq!(report.ranking.len(), 2);

    let ok = pipeline.store().get("startups:ok").unwrap().unwrap();
    assert_eq!(ok.status, OpportunityStatus::Scored);
    let complex = pipeline.store().get("startups:complex").unwrap().unwrap();
    assert_eq!(complex.status, OpportunityStatus::Disqualified);
    assert_eq!(complex.verdict.simplicity_score, 0);
}

#[tokio::test]
async fn rerunning_a_batch_is_idempotent_and_deterministic() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline(&dir);
    let items = vec![batch_item("ok", &["tracker"], 300)];

    let cancel = CancellationToken::new();
    pipeline
        .run_batch(items.clone(), fixed_now(), &cancel)
        .await
        .unwrap();
    let first = pipeline.store().get("startups:ok").unwrap().unwrap();

    pipeline.run_batch(items, fixed_now(), &cancel).await.unwrap();
    let second = pipeline.store().get("startups:ok").unwrap().unwrap();

    assert_eq!(pipeline.store().row_count().unwrap(), 1);
    assert_eq!(
        serde_json::to_vec(&first.scores).unwrap(),
        serde_json::to_vec(&second.scores).unwrap()
    );
    assert_eq!(
        serde_json::to_vec(&first.verdict).unwrap(),
        serde_json::to_vec(&second.verdict).unwrap()
    );
}

#[tokio::test]
async fn ranking_orders_by_score_with_key_tiebreak() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline(&dir);
    // Same text, so identical lexical scores; engagement differs.
    let items = vec![
        batch_item("b", &["tracker"], 10),
        batch_item("a", &["tracker"], 10),
        batch_item("hot", &["tracker"], 5_000),
    ];

    let cancel = CancellationToken::new();
    let report = pipeline.run_batch(items, fixed_now(), &cancel).await.unwrap();

    assert_eq!(report.ranking[0].0, "startups:hot");
    // Tie between a and b resolves by key.
    assert_eq!(report.ranking[1].0, "startups:a");
    assert_eq!(report.ranking[2].0, "startups:b");
}

#[tokio::test]
async fn journal_records_budget_exhaustion_when_gate_refuses() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline(&dir);
    // High-signal item that clears the validation threshold; the
    // zero-budget ledger then refuses the first search call.
    let items = vec![batch_item("ok", &["tracker"], 300)];

    let cancel = CancellationToken::new();
    pipeline.run_batch(items, fixed_now(), &cancel).await.unwrap();

    let day = Utc::now().format("%Y-%m-%d").to_string();
    let content = std::fs::read_to_string(
        dir.path().join("journal").join(format!("runs-{day}.jsonl")),
    )
    .unwrap();
    let kinds: Vec<String> = content
        .lines()
        .map(|line| {
            serde_json::from_str::<serde_json::Value>(line).unwrap()["kind"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();

    assert_eq!(kinds.first().map(String::as_str), Some("batch_start"));
    assert!(kinds.iter().any(|k| k == "budget_exhausted"));
    assert!(kinds.iter().any(|k| k == "item_scored"));
    assert_eq!(kinds.last().map(String::as_str), Some("batch_summary"));
}

#[tokio::test]
async fn cancelled_batch_stops_without_processing() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline(&dir);
    let items = vec![batch_item("ok", &["tracker"], 300)];

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = pipeline.run_batch(items, fixed_now(), &cancel).await.unwrap();

    assert_eq!(report.summary.total_items, 1);
    assert_eq!(report.summary.approved, 0);
    assert_eq!(report.summary.errored, 0);
    assert_eq!(pipeline.store().row_count().unwrap(), 0);
}
