use std::collections::HashMap;

use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use crate::watcher::Subscription;

impl Database {
    // ========================================================================
    // Subscription Operations
    // ========================================================================

    /// Register configured subscriptions (INSERT OR UPDATE).
    ///
    /// A subscription whose feed URL changed loses its checkpoint, since the
    /// stored identifier belongs to a different feed. Rows for owners no
    /// longer configured are left alone.
    pub async fn sync_subscriptions(&self, subscriptions: &[Subscription]) -> Result<()> {
        if subscriptions.is_empty() {
            return Ok(());
        }

        const BATCH_SIZE: usize = 100;
        let mut tx = self.pool.begin().await?;

        for chunk in subscriptions.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO subscriptions (owner, feed_url) ");

            builder.push_values(chunk, |mut b, sub| {
                b.push_bind(&sub.owner).push_bind(&sub.feed_url);
            });

            builder.push(
                " ON CONFLICT(owner) DO UPDATE SET \
                 checkpoint = CASE WHEN subscriptions.feed_url = excluded.feed_url \
                 THEN subscriptions.checkpoint ELSE NULL END, \
                 feed_url = excluded.feed_url",
            );

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Stored checkpoints keyed by owner. Owners without one are omitted.
    pub async fn get_checkpoints(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT owner, checkpoint FROM subscriptions WHERE checkpoint IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Register `subscriptions` and attach their stored checkpoints.
    ///
    /// Syncing happens first so that a checkpoint cleared by a changed feed
    /// URL is not loaded back into memory.
    pub async fn restore_subscriptions(
        &self,
        subscriptions: Vec<Subscription>,
    ) -> Result<Vec<Subscription>> {
        self.sync_subscriptions(&subscriptions).await?;
        let mut checkpoints = self.get_checkpoints().await?;

        Ok(subscriptions
            .into_iter()
            .map(|sub| {
                let checkpoint = checkpoints.remove(&sub.owner);
                sub.with_checkpoint(checkpoint)
            })
            .collect())
    }

    /// Persist checkpoints in a single transaction.
    ///
    /// `None` entries are skipped: a subscription that has never seen an
    /// entry keeps whatever is stored.
    pub async fn save_checkpoints(
        &self,
        checkpoints: &[(String, Option<String>)],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for (owner, checkpoint) in checkpoints {
            let Some(checkpoint) = checkpoint else {
                continue;
            };
            let result = sqlx::query("UPDATE subscriptions SET checkpoint = ? WHERE owner = ?")
                .bind(checkpoint)
                .bind(owner)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(updated)
    }
}
