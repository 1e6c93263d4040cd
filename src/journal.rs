//! Append-only JSONL journal of batch-run events, rotated daily.
//!
//! Events are typed; the journal owns serialization and timestamps so
//! callers cannot produce malformed lines. Write failures are logged and
//! swallowed; the journal must never take down a batch.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use common::BatchSummary;

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn resolve_journal_dir() -> PathBuf {
    if let Ok(raw) = std::env::var("OPPORTUNITY_JOURNAL_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    PathBuf::from("RUNS")
}

/// Everything the pipeline records about a run, one variant per line kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    BatchStart {
        total_items: usize,
    },
    ItemScored {
        key: String,
        total_score: f64,
        adjusted_total: f64,
    },
    ItemDisqualified {
        key: String,
        reason: Option<String>,
        adjusted_total: f64,
    },
    ValidationRequested {
        key: String,
        total_score: f64,
    },
    /// One failed evidence source during synthesis; the item itself
    /// continues with partial evidence.
    ValidationError {
        key: String,
        source: String,
    },
    ItemValidated {
        key: String,
        validation_score: f64,
        data_quality_score: f64,
        cost_usd: f64,
    },
    /// The cost ledger refused the next call; validation was skipped or
    /// cut short for this item.
    BudgetExhausted {
        key: String,
    },
    ItemError {
        key: String,
        error: String,
    },
    BatchCancelled,
    BatchSummary(BatchSummary),
}

#[derive(Serialize)]
struct JournalLine<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a RunEvent,
}

pub struct RunJournal {
    dir: PathBuf,
    day_key: String,
    file: File,
}

impl RunJournal {
    pub fn open(dir: PathBuf) -> std::io::Result<Self> {
        create_dir_all(&dir)?;
        let day_key = Utc::now().format("%Y-%m-%d").to_string();
        let file = day_file(&dir, &day_key)?;
        Ok(Self { dir, day_key, file })
    }

    pub fn record(&mut self, event: &RunEvent) {
        if let Err(e) = self.append(event) {
            tracing::warn!("journal write failed: {}", e);
        }
    }

    fn append(&mut self, event: &RunEvent) -> std::io::Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if today != self.day_key {
            self.file = day_file(&self.dir, &today)?;
            self.day_key = today;
        }

        let line = serde_json::to_string(&JournalLine {
            ts: now_iso(),
            event,
        })
        .unwrap_or_else(|_| r#"{"kind":"unserializable"}"#.to_string());
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn day_file(dir: &Path, day_key: &str) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("runs-{day_key}.jsonl")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(dir: &Path) -> Vec<serde_json::Value> {
        let day_key = Utc::now().format("%Y-%m-%d").to_string();
        let content =
            std::fs::read_to_string(dir.join(format!("runs-{day_key}.jsonl"))).unwrap();
        content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn events_are_appended_as_tagged_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = RunJournal::open(dir.path().to_path_buf()).unwrap();
        journal.record(&RunEvent::BatchStart { total_items: 3 });
        journal.record(&RunEvent::ValidationError {
            key: "c:a".into(),
            source: "http://x.example: fetch failed".into(),
        });
        journal.record(&RunEvent::BudgetExhausted { key: "c:a".into() });

        let lines = read_lines(dir.path());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "batch_start");
        assert_eq!(lines[0]["total_items"], 3);
        assert!(lines[0]["ts"].is_string());
        assert_eq!(lines[1]["kind"], "validation_error");
        assert_eq!(lines[1]["source"], "http://x.example: fetch failed");
        assert_eq!(lines[2]["kind"], "budget_exhausted");
        assert_eq!(lines[2]["key"], "c:a");
    }

    #[test]
    fn summary_fields_are_flattened_into_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = RunJournal::open(dir.path().to_path_buf()).unwrap();
        journal.record(&RunEvent::BatchSummary(BatchSummary {
            total_items: 2,
            approved: 1,
            disqualified: 1,
            validated: 0,
            errored: 0,
            total_cost_usd: 0.0,
            avg_score: 41.5,
        }));

        let lines = read_lines(dir.path());
        assert_eq!(lines[0]["kind"], "batch_summary");
        assert_eq!(lines[0]["approved"], 1);
        assert_eq!(lines[0]["avg_score"], 41.5);
    }
}
