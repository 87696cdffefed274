use chrono::{DateTime, Utc};
use regex::Regex;

// ============================================================================
// Feed Items
// ============================================================================

/// Display name used for watch rules configured without a `name`.
pub const UNNAMED_RULE: &str = "unknown";

/// Pass-through metadata published by torrent index feeds.
///
/// None of these fields are interpreted by the matching engine; they are
/// carried along so notifications can render them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMeta {
    /// Human-facing page for the item (the RSS `<guid>` on most indexes)
    pub page: Option<String>,
    pub size: Option<String>,
    pub seeders: Option<String>,
    pub leechers: Option<String>,
    pub downloads: Option<String>,
    pub category: Option<String>,
}

/// One entry from a polled feed.
///
/// `identifier` is the dedup key: the torrent infohash when the feed
/// publishes one, otherwise the entry guid or a content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub identifier: String,
    pub published_at: Option<DateTime<Utc>>,
    pub meta: ItemMeta,
}

// ============================================================================
// Watch Rules & Subscriptions
// ============================================================================

/// One entry of a subscription's watchlist, with its patterns compiled.
///
/// Tags are stored lowercased so matching only lowercases the item title.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pub name: String,
    pub tags: Vec<String>,
    pub include_regex: Vec<Regex>,
    pub exclude_regex: Vec<Regex>,
    pub delivery_targets: Vec<String>,
}

impl WatchRule {
    /// Build a rule from raw pattern strings.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn compile(
        name: Option<&str>,
        tags: &[String],
        include: &[String],
        exclude: &[String],
        delivery_targets: &[String],
    ) -> Result<Self, regex::Error> {
        let include_regex = include
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regex = exclude
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => UNNAMED_RULE.to_string(),
        };

        Ok(Self {
            name,
            tags: tags.iter().map(|t| t.to_lowercase()).collect(),
            include_regex,
            exclude_regex,
            delivery_targets: delivery_targets.to_vec(),
        })
    }

    /// A rule with no tags and no include patterns can never match.
    pub fn is_inert(&self) -> bool {
        self.tags.is_empty() && self.include_regex.is_empty()
    }
}

/// One watched feed source.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub owner: String,
    pub feed_url: String,
    /// Evaluated in order; the first rule that claims an entry wins.
    pub watch_rules: Vec<WatchRule>,
    /// Identifier of the newest entry seen by the previous scan.
    pub checkpoint: Option<String>,
}

impl Subscription {
    pub fn new(owner: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            feed_url: feed_url.into(),
            watch_rules: Vec::new(),
            checkpoint: None,
        }
    }

    pub fn with_rules(mut self, rules: Vec<WatchRule>) -> Self {
        self.watch_rules = rules;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<String>) -> Self {
        self.checkpoint = checkpoint.filter(|c| !c.is_empty());
        self
    }

    /// Subscriptions without a watchlist deliver every new upload.
    pub fn is_catch_all(&self) -> bool {
        self.watch_rules.is_empty()
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// A feed item claimed for delivery during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryItem {
    pub item: FeedItem,
    pub owner: String,
    /// Name of the rule that claimed the item; `None` for catch-all subscriptions.
    pub matched_rule: Option<String>,
    /// Webhook names to notify once the item is downloaded
    pub delivery_targets: Vec<String>,
}

impl DeliveryItem {
    pub fn title(&self) -> &str {
        &self.item.title
    }

    pub fn identifier(&self) -> &str {
        &self.item.identifier
    }
}
