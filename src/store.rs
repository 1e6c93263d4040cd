//! Dual-tier persistence: a current-state table upserted by identity key
//! and an append-only evidence history for audit. Store failures are
//! fatal to the batch; everything upstream degrades gracefully instead.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use common::{OpportunityRecord, OpportunityStatus, RawItem, ValidationEvidence};

pub struct OpportunityStore {
    conn: Connection,
}

impl OpportunityStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open opportunity store at {path}"))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS opportunities (
                key         TEXT PRIMARY KEY,
                item_json   TEXT NOT NULL,
                scores_json TEXT,
                verdict_json TEXT,
                trust_json  TEXT,
                status      TEXT NOT NULL,
                total_score REAL NOT NULL DEFAULT 0,
                error       TEXT,
                updated_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS evidence_history (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                key           TEXT NOT NULL,
                evidence_json TEXT NOT NULL,
                collected_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_evidence_key ON evidence_history(key);
            "#,
        )?;
        Ok(())
    }

    /// Merge by identity key: scored fields overwrite, evidence appends.
    /// Re-running an unchanged item leaves exactly one row.
    pub fn upsert(&mut self, record: &OpportunityRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO opportunities
                (key, item_json, scores_json, verdict_json, trust_json, status, total_score, error, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
            ON CONFLICT(key) DO UPDATE SET
                item_json = excluded.item_json,
                scores_json = excluded.scores_json,
                verdict_json = excluded.verdict_json,
                trust_json = excluded.trust_json,
                status = excluded.status,
                total_score = excluded.total_score,
                error = NULL,
                updated_at = excluded.updated_at
            "#,
            params![
                record.key,
                serde_json::to_string(&record.item)?,
                serde_json::to_string(&record.scores)?,
                serde_json::to_string(&record.verdict)?,
                serde_json::to_string(&record.trust)?,
                record.status.as_str(),
                record.scores.total_score,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if let Some(evidence) = &record.evidence {
            tx.execute(
                "INSERT INTO evidence_history (key, evidence_json, collected_at) VALUES (?1, ?2, ?3)",
                params![
                    record.key,
                    serde_json::to_string(evidence)?,
                    evidence.collected_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Persist a processing failure without fabricating scores. Keeps any
    /// previously stored scoring columns.
    pub fn record_error(&self, key: &str, item: &RawItem, message: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO opportunities (key, item_json, status, error, updated_at)
            VALUES (?1, ?2, 'error', ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                status = 'error',
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
            params![key, serde_json::to_string(item)?, message, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<OpportunityRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT item_json, scores_json, verdict_json, trust_json, status
                 FROM opportunities WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((item_json, scores_json, verdict_json, trust_json, status)) = row else {
            return Ok(None);
        };
        let (Some(scores_json), Some(verdict_json), Some(trust_json)) =
            (scores_json, verdict_json, trust_json)
        else {
            // Error rows with no scoring columns yet.
            return Ok(None);
        };
        let status = OpportunityStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown status '{status}' for key {key}"))?;

        Ok(Some(OpportunityRecord {
            key: key.to_string(),
            item: serde_json::from_str(&item_json)?,
            scores: serde_json::from_str(&scores_json)?,
            verdict: serde_json::from_str(&verdict_json)?,
            trust: serde_json::from_str(&trust_json)?,
            evidence: self.latest_evidence(key)?,
            status,
        }))
    }

    fn latest_evidence(&self, key: &str) -> Result<Option<ValidationEvidence>> {
        let json = self
            .conn
            .query_row(
                "SELECT evidence_json FROM evidence_history WHERE key = ?1 ORDER BY id DESC LIMIT 1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(match json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    pub fn evidence_history_len(&self, key: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM evidence_history WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn row_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM opportunities", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Final ranking: total score descending, identity key as the
    /// deterministic tie-break. Error rows are excluded.
    pub fn ranked(&self) -> Result<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, total_score FROM opportunities
             WHERE status != 'error'
             ORDER BY total_score DESC, key ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{ConstraintVerdict, DimensionScores, TrustIndicators, TrustLevel};

    fn record(key: &str, total_seed: f64) -> OpportunityRecord {
        let item = RawItem {
            id: key.to_string(),
            title: "t".into(),
            body: "b".into(),
            community: "c".into(),
            upvotes: 10,
            comment_count: 2,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        };
        OpportunityRecord {
            key: item.identity_key(),
            item,
            scores: DimensionScores::from_parts(
                total_seed, total_seed, total_seed, total_seed, total_seed,
            ),
            verdict: ConstraintVerdict {
                is_disqualified: false,
                violation_reason: None,
                simplicity_score: 100,
            },
            trust: TrustIndicators {
                subreddit_activity: 0.0,
                post_engagement: 0.0,
                trend_velocity: 0.0,
                problem_validity: 0.0,
                discussion_quality: 0.0,
                ai_confidence: 0.0,
                overall_trust_score: 0.0,
                trust_level: TrustLevel::Low,
                badges: vec![],
            },
            evidence: None,
            status: OpportunityStatus::Scored,
        }
    }

    fn evidence(cost: f64) -> ValidationEvidence {
        ValidationEvidence {
            competitors: vec![],
            market_size: None,
            launches: vec![],
            validation_score: 10.0,
            data_quality_score: 0.0,
            total_cost_usd: cost,
            reasoning: "r".into(),
            collected_at: Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut store = OpportunityStore::open_in_memory().unwrap();
        let rec = record("a", 50.0);
        store.upsert(&rec).unwrap();
        store.upsert(&rec).unwrap();
        assert_eq!(store.row_count().unwrap(), 1);

        let loaded = store.get(&rec.key).unwrap().unwrap();
        assert_eq!(loaded.scores, rec.scores);
        assert_eq!(loaded.status, OpportunityStatus::Scored);
    }

    #[test]
    fn evidence_history_appends_not_overwrites() {
        let mut store = OpportunityStore::open_in_memory().unwrap();
        let mut rec = record("a", 70.0);
        rec.evidence = Some(evidence(0.10));
        rec.status = OpportunityStatus::Validated;
        store.upsert(&rec).unwrap();

        rec.evidence = Some(evidence(0.25));
        store.upsert(&rec).unwrap();

        assert_eq!(store.row_count().unwrap(), 1);
        assert_eq!(store.evidence_history_len(&rec.key).unwrap(), 2);
        // Latest evidence wins on read.
        let loaded = store.get(&rec.key).unwrap().unwrap();
        assert_eq!(loaded.evidence.unwrap().total_cost_usd, 0.25);
    }

    #[test]
    fn ranking_sorts_by_score_then_key() {
        let mut store = OpportunityStore::open_in_memory().unwrap();
        store.upsert(&record("b", 80.0)).unwrap();
        store.upsert(&record("a", 80.0)).unwrap();
        store.upsert(&record("z", 90.0)).unwrap();

        let ranked = store.ranked().unwrap();
        assert_eq!(ranked[0].0, "c:z");
        assert_eq!(ranked[1].0, "c:a");
        assert_eq!(ranked[2].0, "c:b");
    }

    #[test]
    fn error_rows_are_excluded_from_ranking() {
        let mut store = OpportunityStore::open_in_memory().unwrap();
        let rec = record("ok", 60.0);
        store.upsert(&rec).unwrap();
        let failed = record("bad", 0.0);
        store
            .record_error(&failed.key, &failed.item, "profile rejected")
            .unwrap();

        assert_eq!(store.row_count().unwrap(), 2);
        let ranked = store.ranked().unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "c:ok");
    }
}
