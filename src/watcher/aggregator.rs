use super::checkpoint::commit;
use super::ledger::HistoryLedger;
use super::scanner::scan;
use super::types::{DeliveryItem, FeedItem, Subscription};

/// Scan every subscription for one tick and commit their checkpoints.
///
/// `entries_for` supplies the already-fetched entries of a subscription; a
/// failed fetch is an empty slice, which yields nothing and keeps the
/// checkpoint. The combined batch is stably sorted by title.
pub fn run_tick<'a, F>(
    subscriptions: &mut [Subscription],
    ledger: &HistoryLedger,
    mut entries_for: F,
) -> Vec<DeliveryItem>
where
    F: FnMut(&Subscription) -> &'a [FeedItem],
{
    let mut combined = Vec::new();

    for subscription in subscriptions.iter_mut() {
        let entries = entries_for(subscription);
        if entries.is_empty() {
            tracing::warn!(owner = %subscription.owner, "No uploads available from feed");
        }

        let outcome = scan(entries, subscription, ledger);
        tracing::info!(
            owner = %subscription.owner,
            examined = outcome.examined,
            matched = outcome.batch.len(),
            "Scanned subscription"
        );

        combined.extend(outcome.batch);
        commit(subscription, outcome.newest);
    }

    sort_batch(&mut combined);
    combined
}

/// Stable, ordinal sort by title. Presentation only.
pub fn sort_batch(batch: &mut [DeliveryItem]) {
    batch.sort_by(|a, b| a.title().cmp(b.title()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::WatchRule;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn entry(id: &str, title: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            identifier: id.to_string(),
            ..Default::default()
        }
    }

    fn any_rule() -> WatchRule {
        WatchRule::compile(Some("any"), &[], &[".".to_string()], &[], &[]).unwrap()
    }

    #[test]
    fn test_batch_is_sorted_across_subscriptions() {
        let mut subs = vec![
            Subscription::new("first", "https://a.example.com/rss").with_rules(vec![any_rule()]),
            Subscription::new("second", "https://b.example.com/rss").with_rules(vec![any_rule()]),
        ];
        let feeds: HashMap<&str, Vec<FeedItem>> = HashMap::from([
            ("first", vec![entry("z", "Zeta")]),
            ("second", vec![entry("a", "Alpha")]),
        ]);

        let batch = run_tick(&mut subs, &HistoryLedger::new(), |s| {
            feeds.get(s.owner.as_str()).map(Vec::as_slice).unwrap_or(&[])
        });

        let titles: Vec<_> = batch.iter().map(|d| d.title()).collect();
        assert_eq!(titles, vec!["Alpha", "Zeta"]);
        assert_eq!(batch[0].owner, "second");
    }

    #[test]
    fn test_failed_fetch_keeps_checkpoint_and_continues() {
        let mut subs = vec![
            Subscription::new("down", "https://a.example.com/rss")
                .with_rules(vec![any_rule()])
                .with_checkpoint(Some("kept".to_string())),
            Subscription::new("up", "https://b.example.com/rss").with_rules(vec![any_rule()]),
        ];
        let up = vec![entry("n1", "New One")];

        let batch = run_tick(&mut subs, &HistoryLedger::new(), |s| {
            if s.owner == "up" {
                up.as_slice()
            } else {
                &[]
            }
        });

        assert_eq!(batch.len(), 1);
        assert_eq!(subs[0].checkpoint.as_deref(), Some("kept"));
        assert_eq!(subs[1].checkpoint.as_deref(), Some("n1"));
    }

    #[test]
    fn test_sort_is_stable_for_equal_titles() {
        let mut batch: Vec<DeliveryItem> = ["x", "y"]
            .iter()
            .map(|owner| DeliveryItem {
                item: entry(owner, "Same"),
                owner: owner.to_string(),
                matched_rule: None,
                delivery_targets: Vec::new(),
            })
            .collect();
        sort_batch(&mut batch);
        assert_eq!(batch[0].owner, "x");
        assert_eq!(batch[1].owner, "y");
    }

    #[test]
    fn test_sort_is_ordinal() {
        let mut batch: Vec<DeliveryItem> = ["b", "B", "a"]
            .iter()
            .map(|t| DeliveryItem {
                item: entry(t, t),
                owner: "o".to_string(),
                matched_rule: None,
                delivery_targets: Vec::new(),
            })
            .collect();
        sort_batch(&mut batch);
        let titles: Vec<_> = batch.iter().map(|d| d.title()).collect();
        assert_eq!(titles, vec!["B", "a", "b"]);
    }
}
