use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{HistoryCounts, HistoryEntry, HistoryKind, NewHistoryEntry};
use crate::util::strip_control_chars;
use crate::watcher::HistoryLedger;

type HistoryRow = (i64, String, String, Option<String>, String, String, i64);

impl Database {
    // ========================================================================
    // History Operations
    // ========================================================================

    /// Append history rows in one transaction. Returns the number inserted.
    pub async fn append_history(&self, entries: &[NewHistoryEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        const BATCH_SIZE: usize = 100;
        let recorded_at = Utc::now().timestamp();
        let mut inserted = 0;
        let mut tx = self.pool.begin().await?;

        for chunk in entries.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO history (owner, title, page, identifier, kind, recorded_at) ",
            );

            builder.push_values(chunk, |mut b, entry| {
                b.push_bind(&entry.owner)
                    .push_bind(&entry.title)
                    .push_bind(&entry.page)
                    .push_bind(&entry.identifier)
                    .push_bind(entry.kind.as_str())
                    .push_bind(recorded_at);
            });

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Identifiers of every successfully downloaded item.
    pub async fn delivered_identifiers(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT identifier FROM history WHERE kind = 'downloaded'")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Build the in-memory dedup ledger from stored downloads.
    pub async fn load_ledger(&self) -> Result<HistoryLedger> {
        Ok(self.delivered_identifiers().await?.into_iter().collect())
    }

    /// Most recent history rows, newest first, optionally filtered by kind.
    pub async fn get_history(
        &self,
        kind: Option<HistoryKind>,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = match kind {
            Some(kind) => {
                sqlx::query_as(
                    r#"
                    SELECT id, owner, title, page, identifier, kind, recorded_at
                    FROM history
                    WHERE kind = ?
                    ORDER BY id DESC
                    LIMIT ?
                "#,
                )
                .bind(kind.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, owner, title, page, identifier, kind, recorded_at
                    FROM history
                    ORDER BY id DESC
                    LIMIT ?
                "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .filter_map(|(id, owner, title, page, identifier, kind, recorded_at)| {
                let Some(kind) = HistoryKind::parse(&kind) else {
                    tracing::warn!(id = id, kind = %kind, "Skipping history row with unknown kind");
                    return None;
                };
                Some(HistoryEntry {
                    id,
                    owner,
                    title: strip_control_chars(&title).into_owned(),
                    page,
                    identifier,
                    kind,
                    recorded_at: DateTime::from_timestamp(recorded_at, 0).unwrap_or_default(),
                })
            })
            .collect())
    }

    pub async fn history_counts(&self) -> Result<HistoryCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT kind, COUNT(*) FROM history GROUP BY kind")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HistoryCounts::default();
        for (kind, count) in rows {
            match HistoryKind::parse(&kind) {
                Some(HistoryKind::Downloaded) => counts.downloaded = count,
                Some(HistoryKind::Failed) => counts.failed = count,
                None => {}
            }
        }
        Ok(counts)
    }
}
