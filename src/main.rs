use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use std::sync::Arc;

use llm_client::LlmClient;
use opportunity_bot::config::AppConfig;
use opportunity_bot::journal::{resolve_journal_dir, RunJournal};
use opportunity_bot::pipeline::{BatchItem, Pipeline};
use opportunity_bot::store::OpportunityStore;
use validation_engine::{CostLedger, MarketValidator};
use web_client::WebClient;

#[derive(Debug, Parser)]
#[command(name = "opportunity-bot", about = "Score, gate and validate opportunity candidates")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// JSONL file of batch items (raw item + profiler payload per line).
    #[arg(long)]
    input: String,

    /// Process at most this many items from the input.
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;
    info!("Loaded configuration from {}", args.config);

    if !config.llm.provider.eq_ignore_ascii_case("anthropic") {
        warn!(
            "Configured provider '{}' but this pipeline currently supports Anthropic only",
            config.llm.provider
        );
    }
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY must be set for evidence extraction")?;

    let items = load_items(&args.input, args.limit)?;
    info!("Loaded {} items from {}", items.len(), args.input);

    let web = Arc::new(WebClient::new(config.web.clone())?);
    let llm = Arc::new(LlmClient::new(
        api_key,
        config.llm.model.clone(),
        config.llm.timeout_ms,
        config.llm.max_retries,
    )?);
    let ledger = CostLedger::new(
        config.budget.cost_model.clone(),
        config.budget.per_item_ceiling_usd,
        config.budget.per_batch_ceiling_usd,
    )?;
    let validator = MarketValidator::new(web, llm, ledger, config.validation.clone());

    let store = OpportunityStore::open(&config.store.db_path)?;
    let journal = RunJournal::open(resolve_journal_dir())?;
    info!("Run journal path: {}", journal.dir().display());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling batch");
            signal_token.cancel();
        }
    });

    let mut pipeline = Pipeline::new(validator, store, journal);
    let report = pipeline.run_batch(items, chrono::Utc::now(), &cancel).await?;

    info!(
        "Batch done: {}/{} approved, {} disqualified, {} validated, {} errored, ${:.4} spent",
        report.summary.approved,
        report.summary.total_items,
        report.summary.disqualified,
        report.summary.validated,
        report.summary.errored,
        report.summary.total_cost_usd,
    );
    for (rank, (key, score)) in report.ranking.iter().take(20).enumerate() {
        info!("#{:<3} {:<40} {:.2}", rank + 1, key, score);
    }
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    Ok(())
}

fn load_items(path: &str, limit: Option<usize>) -> Result<Vec<BatchItem>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let mut items = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: BatchItem = serde_json::from_str(line)
            .with_context(|| format!("malformed batch item at {path}:{}", line_no + 1))?;
        items.push(item);
        if limit.is_some_and(|l| items.len() >= l) {
            break;
        }
    }
    Ok(items)
}
