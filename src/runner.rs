//! Tick loop: fetch → match → download → notify → record.
//!
//! The watcher core decides what to deliver; this module performs the I/O
//! around it and persists checkpoints and history once per tick.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::download::Downloader;
use crate::feed::{fetch_all, FetchPolicy};
use crate::notify::Notifier;
use crate::storage::{Database, HistoryKind, NewHistoryEntry};
use crate::util::{format_interval, plural};
use crate::watcher::{DeliveryItem, Watcher};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Feeds fetched successfully.
    pub feeds: usize,
    /// Items the watcher selected for delivery.
    pub matched: usize,
    pub downloaded: usize,
    pub failed: usize,
    /// Webhook notifications sent.
    pub notified: usize,
}

pub struct Runner {
    db: Database,
    client: reqwest::Client,
    watcher: Watcher,
    downloader: Downloader,
    notifier: Notifier,
    fetch_policy: FetchPolicy,
    interval: Duration,
}

impl Runner {
    pub fn new(
        db: Database,
        client: reqwest::Client,
        watcher: Watcher,
        downloader: Downloader,
        notifier: Notifier,
    ) -> Self {
        Self {
            db,
            client,
            watcher,
            downloader,
            notifier,
            fetch_policy: FetchPolicy::default(),
            interval: Duration::from_secs(600),
        }
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    /// Run one full cycle.
    ///
    /// Feed, download and notification failures are logged and skipped.
    /// Only database errors are returned, after the in-memory state has
    /// already been updated. History and checkpoints are both written even
    /// if one of them fails.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let feeds = fetch_all(&self.client, self.watcher.subscriptions(), &self.fetch_policy).await;
        let batch = self.watcher.run_tick(&feeds);

        let mut report = TickReport {
            feeds: feeds.len(),
            matched: batch.len(),
            ..TickReport::default()
        };

        let (delivered, failed) = self.deliver(&batch, &mut report).await;
        report.downloaded = delivered.len();
        report.failed = failed.len();

        self.watcher.record_delivered(&delivered);

        // History before checkpoints; attempt both.
        let history: Vec<NewHistoryEntry> = delivered
            .iter()
            .map(|d| NewHistoryEntry::from_delivery(d, HistoryKind::Downloaded))
            .chain(
                failed
                    .iter()
                    .map(|d| NewHistoryEntry::from_delivery(d, HistoryKind::Failed)),
            )
            .collect();
        let recorded = self
            .db
            .append_history(&history)
            .await
            .context("Failed to record download history");
        let saved = self
            .db
            .save_checkpoints(&self.watcher.checkpoints())
            .await
            .context("Failed to save checkpoints");
        recorded?;
        saved?;

        if report.matched > 0 {
            tracing::info!(
                downloaded = report.downloaded,
                failed = report.failed,
                notified = report.notified,
                "Tick finished: {} of {}",
                plural(report.downloaded as u64, "torrent"),
                report.matched
            );
        } else {
            tracing::info!(feeds = report.feeds, "Tick finished: no new uploads");
        }

        Ok(report)
    }

    /// Download each item in batch order and notify its targets.
    async fn deliver(
        &self,
        batch: &[DeliveryItem],
        report: &mut TickReport,
    ) -> (Vec<DeliveryItem>, Vec<DeliveryItem>) {
        let mut delivered = Vec::new();
        let mut failed = Vec::new();

        for item in batch {
            match self.downloader.download(item).await {
                Ok(_) => {
                    report.notified += self.notifier.notify_targets(item).await;
                    delivered.push(item.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        owner = %item.owner,
                        title = %item.title(),
                        error = %e,
                        "Download failed, will retry when seen again"
                    );
                    failed.push(item.clone());
                }
            }
        }

        (delivered, failed)
    }

    /// Tick every interval until SIGINT or SIGTERM.
    ///
    /// The first tick runs immediately. Signals are handled between ticks,
    /// never in the middle of one. Late ticks are delayed, not bursted.
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        #[cfg(unix)]
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        #[cfg(unix)]
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

        tracing::info!(
            subscriptions = self.watcher.subscriptions().len(),
            "Checking feeds every {}",
            format_interval(self.interval.as_secs())
        );

        loop {
            #[cfg(unix)]
            let sigterm_fut = sigterm.recv();
            #[cfg(not(unix))]
            let sigterm_fut = std::future::pending::<Option<()>>();

            #[cfg(unix)]
            let sigint_fut = sigint.recv();
            #[cfg(not(unix))]
            let sigint_fut = async { tokio::signal::ctrl_c().await.ok() };

            tokio::select! {
                biased;

                _ = sigterm_fut => {
                    tracing::info!("Received SIGTERM, shutting down");
                    break;
                }

                _ = sigint_fut => {
                    tracing::info!("Received SIGINT, shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        let error = format!("{:#}", e);
                        tracing::warn!(error = %error, "Tick failed");
                    }
                }
            }
        }

        Ok(())
    }
}
