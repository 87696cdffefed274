//! Feed matching and deduplication engine.
//!
//! Everything in this module is pure: feed entries come in already fetched,
//! history comes in as a [`HistoryLedger`], and the caller owns persistence.
//!
//! - [`matcher`] - three-valued evaluation of one item against one watch rule
//! - [`ledger`] - checkpoint comparison and the delivered-identifier history
//! - [`scanner`] - per-feed scan producing annotated delivery items
//! - [`aggregator`] - one tick across all subscriptions, sorted by title
//! - [`checkpoint`] - advancing a subscription's checkpoint after a scan
//!
//! # Example
//!
//! ```
//! use feedwatch::watcher::{FeedItem, HistoryLedger, Subscription, WatchRule, Watcher};
//! use std::collections::HashMap;
//!
//! let rule = WatchRule::compile(Some("hd"), &["720p".into()], &[], &["CAM".into()], &[]).unwrap();
//! let sub = Subscription::new("Uploader", "https://example.com/rss").with_rules(vec![rule]);
//! let mut watcher = Watcher::new(vec![sub], HistoryLedger::new());
//!
//! let feeds = HashMap::from([(
//!     "Uploader".to_string(),
//!     vec![FeedItem {
//!         title: "Show.S01E01.720p".into(),
//!         identifier: "h1".into(),
//!         ..Default::default()
//!     }],
//! )]);
//! let batch = watcher.run_tick(&feeds);
//! assert_eq!(batch.len(), 1);
//! ```

pub mod aggregator;
pub mod checkpoint;
pub mod ledger;
pub mod matcher;
pub mod scanner;
mod types;

use std::collections::HashMap;

use thiserror::Error;

pub use aggregator::{run_tick, sort_batch};
pub use ledger::{is_checkpoint, HistoryLedger};
pub use matcher::{decide, evaluate, Evaluation, Verdict};
pub use scanner::{find_first, scan, ScanOutcome};
pub use types::{DeliveryItem, FeedItem, ItemMeta, Subscription, WatchRule, UNNAMED_RULE};

#[derive(Debug, Error)]
pub enum WatchError {
    /// Asked to scan an owner that is not part of the configured set
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),
}

/// Subscriptions plus delivery history, driven one tick at a time.
#[derive(Debug, Clone)]
pub struct Watcher {
    subscriptions: Vec<Subscription>,
    ledger: HistoryLedger,
}

impl Watcher {
    pub fn new(subscriptions: Vec<Subscription>, ledger: HistoryLedger) -> Self {
        Self {
            subscriptions,
            ledger,
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// Run one tick with entries keyed by subscription owner.
    ///
    /// Owners missing from `feeds` are treated as failed fetches.
    pub fn run_tick(&mut self, feeds: &HashMap<String, Vec<FeedItem>>) -> Vec<DeliveryItem> {
        run_tick(&mut self.subscriptions, &self.ledger, |sub| {
            feeds.get(&sub.owner).map(Vec::as_slice).unwrap_or(&[])
        })
    }

    /// Scan a single subscription and commit its checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::UnknownSubscription`] if `owner` is not configured.
    pub fn scan_subscription(
        &mut self,
        owner: &str,
        entries: &[FeedItem],
    ) -> Result<Vec<DeliveryItem>, WatchError> {
        let subscription = self
            .subscriptions
            .iter_mut()
            .find(|s| s.owner == owner)
            .ok_or_else(|| WatchError::UnknownSubscription(owner.to_string()))?;

        let outcome = scan(entries, subscription, &self.ledger);
        checkpoint::commit(subscription, outcome.newest);

        let mut batch = outcome.batch;
        sort_batch(&mut batch);
        Ok(batch)
    }

    /// Record items whose delivery succeeded. Returns how many were new.
    pub fn record_delivered(&mut self, items: &[DeliveryItem]) -> usize {
        self.ledger.record(items)
    }

    /// Current `(owner, checkpoint)` pairs for persistence.
    pub fn checkpoints(&self) -> Vec<(String, Option<String>)> {
        self.subscriptions
            .iter()
            .map(|s| (s.owner.clone(), s.checkpoint.clone()))
            .collect()
    }
}
