use super::ledger::{is_checkpoint, HistoryLedger};
use super::matcher::evaluate;
use super::types::{DeliveryItem, FeedItem, Subscription, WatchRule};

/// Result of scanning one subscription's feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Items to deliver, in feed order
    pub batch: Vec<DeliveryItem>,
    /// Identifier of the first feed entry; the next checkpoint
    pub newest: Option<String>,
    /// Number of entries examined before the checkpoint stopped the scan
    pub examined: usize,
}

/// Return the first rule, in configured order, that claims `item`.
pub fn find_first<'r>(item: &FeedItem, rules: &'r [WatchRule]) -> Option<&'r WatchRule> {
    rules.iter().find(|rule| {
        let eval = evaluate(item, rule);
        tracing::debug!(
            title = %item.title,
            rule = %rule.name,
            tag = ?eval.tag,
            include = ?eval.include,
            exclude = ?eval.exclude,
            decision = eval.decision,
            "Evaluated watch rule"
        );
        eval.decision
    })
}

/// Scan feed entries (newest-first) for items to deliver.
///
/// Stops at the subscription's checkpoint. Each remaining entry is claimed
/// by at most one rule; entries already in `ledger` are skipped. The first
/// entry's identifier is reported as `newest` whether or not it matched.
pub fn scan(
    entries: &[FeedItem],
    subscription: &Subscription,
    ledger: &HistoryLedger,
) -> ScanOutcome {
    let newest = entries
        .first()
        .map(|e| e.identifier.clone())
        .filter(|id| !id.is_empty());

    let mut batch = Vec::new();
    let mut examined = 0;

    for entry in entries {
        if is_checkpoint(&entry.identifier, subscription) {
            tracing::debug!(
                owner = %subscription.owner,
                title = %entry.title,
                "Reached previously fetched entry"
            );
            break;
        }
        examined += 1;

        let matched_rule = if subscription.is_catch_all() {
            None
        } else {
            match find_first(entry, &subscription.watch_rules) {
                Some(rule) => Some(rule),
                None => continue,
            }
        };

        if ledger.is_delivered(&entry.identifier) {
            tracing::debug!(
                owner = %subscription.owner,
                title = %entry.title,
                identifier = %entry.identifier,
                "Skipping entry found in history"
            );
            continue;
        }

        tracing::debug!(
            owner = %subscription.owner,
            title = %entry.title,
            rule = matched_rule.map(|r| r.name.as_str()).unwrap_or("-"),
            "Queued entry for delivery"
        );

        batch.push(DeliveryItem {
            item: entry.clone(),
            owner: subscription.owner.clone(),
            matched_rule: matched_rule.map(|r| r.name.clone()),
            delivery_targets: matched_rule
                .map(|r| r.delivery_targets.clone())
                .unwrap_or_default(),
        });
    }

    ScanOutcome {
        batch,
        newest,
        examined,
    }
}
