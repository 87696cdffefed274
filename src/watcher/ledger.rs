use std::collections::HashSet;

use super::types::{DeliveryItem, Subscription};

/// True iff `identifier` is the subscription's last-seen entry.
///
/// Feeds are newest-first, so reaching the checkpoint means every later
/// entry was already scanned by a previous tick.
pub fn is_checkpoint(identifier: &str, subscription: &Subscription) -> bool {
    subscription.checkpoint.as_deref() == Some(identifier)
}

/// Identifiers of every item confirmed delivered.
///
/// Grows monotonically. Only successful deliveries are recorded here, so an
/// item whose download failed stays eligible on the next tick.
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    delivered: HashSet<String>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_delivered(&self, identifier: &str) -> bool {
        self.delivered.contains(identifier)
    }

    /// Record delivered items, returning how many identifiers were new.
    pub fn record<'a, I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = &'a DeliveryItem>,
    {
        items
            .into_iter()
            .filter(|d| self.record_identifier(d.identifier()))
            .count()
    }

    /// Empty identifiers are ignored; they cannot be looked up reliably.
    pub fn record_identifier(&mut self, identifier: &str) -> bool {
        if identifier.is_empty() {
            return false;
        }
        self.delivered.insert(identifier.to_string())
    }

    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}

impl FromIterator<String> for HistoryLedger {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            delivered: iter.into_iter().filter(|id| !id.is_empty()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::FeedItem;

    fn delivery(identifier: &str) -> DeliveryItem {
        DeliveryItem {
            item: FeedItem {
                title: format!("Title {identifier}"),
                identifier: identifier.to_string(),
                ..Default::default()
            },
            owner: "owner".to_string(),
            matched_rule: None,
            delivery_targets: Vec::new(),
        }
    }

    #[test]
    fn test_checkpoint_compare() {
        let sub = Subscription::new("a", "https://example.com/rss")
            .with_checkpoint(Some("abc".to_string()));
        assert!(is_checkpoint("abc", &sub));
        assert!(!is_checkpoint("abd", &sub));

        let fresh = Subscription::new("a", "https://example.com/rss");
        assert!(!is_checkpoint("abc", &fresh));
        assert!(!is_checkpoint("", &fresh));
    }

    #[test]
    fn test_empty_checkpoint_is_treated_as_absent() {
        let sub =
            Subscription::new("a", "https://example.com/rss").with_checkpoint(Some(String::new()));
        assert!(sub.checkpoint.is_none());
        assert!(!is_checkpoint("", &sub));
    }

    #[test]
    fn test_record_counts_new_identifiers_only() {
        let mut ledger = HistoryLedger::new();
        assert_eq!(ledger.record(&[delivery("a"), delivery("b")]), 2);
        assert_eq!(ledger.record(&[delivery("b"), delivery("c")]), 1);
        assert_eq!(ledger.len(), 3);
        assert!(ledger.is_delivered("a"));
        assert!(!ledger.is_delivered("d"));
    }

    #[test]
    fn test_empty_identifiers_are_never_recorded() {
        let mut ledger: HistoryLedger = vec![String::new(), "x".to_string()].into_iter().collect();
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.record_identifier(""));
        assert!(!ledger.is_delivered(""));
    }
}
