//! Configuration file parser for `<config_dir>/config.toml`.
//!
//! Unlike a pure preferences file, the watcher cannot run without
//! subscriptions, so a missing file is reported as [`ConfigError::Missing`]
//! and the caller may write [`Config::TEMPLATE`] for the user to fill in.
//! Unknown keys are accepted but logged, as they are usually typos.
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::validate_url;
use crate::watcher::{Subscription, WatchRule};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Config file not found: {0}")]
    Missing(PathBuf),

    /// A value is present but unusable; the message names the offending entry.
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid pattern in watchlist '{rule}' of '{owner}': {source}")]
    Pattern {
        owner: String,
        rule: String,
        #[source]
        source: regex::Error,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Shortest allowed polling interval.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Top-level watcher configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between ticks.
    pub interval_secs: u64,

    /// Directory that receives downloaded `.torrent` files.
    pub downloads_dir: PathBuf,

    pub subscriptions: Vec<SubscriptionConfig>,

    pub webhooks: Vec<WebhookConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            downloads_dir: PathBuf::from("/downloads"),
            subscriptions: Vec::new(),
            webhooks: Vec::new(),
        }
    }
}

/// One watched feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// Display name of the feed owner; must be unique.
    pub owner: String,
    pub rss: String,
    /// Empty watchlist delivers every new upload.
    #[serde(default)]
    pub watchlist: Vec<WatchRuleConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchRuleConfig {
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub regex: Vec<String>,
    pub exclude_regex: Vec<String>,
    pub webhooks: Vec<String>,
}

/// A notification channel.
///
/// The webhook URL embeds its token, so `Debug` masks it.
#[derive(Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub url: SecretString,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("name", &self.name)
            .field("url", &"[REDACTED]")
            .field("notifications", &self.notifications)
            .finish()
    }
}

impl WebhookConfig {
    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Notification layout. `show_*` values give the field position (1-6);
/// 0 hides the field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Title template; empty uses the default title.
    pub title: String,
    /// Description template; empty omits the description.
    pub description: String,
    pub show_published: u8,
    pub show_size: u8,
    pub show_category: u8,
    pub show_downloads: u8,
    pub show_seeders: u8,
    pub show_leechers: u8,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            show_published: 1,
            show_size: 2,
            show_category: 3,
            show_downloads: 4,
            show_seeders: 5,
            show_leechers: 6,
        }
    }
}

/// Embed fields a notification can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationField {
    Published,
    Size,
    Category,
    Downloads,
    Seeders,
    Leechers,
}

impl NotificationField {
    pub fn label(self) -> &'static str {
        match self {
            NotificationField::Published => "Published",
            NotificationField::Size => "Size",
            NotificationField::Category => "Category",
            NotificationField::Downloads => "Downloads",
            NotificationField::Seeders => "Seeders",
            NotificationField::Leechers => "Leechers",
        }
    }
}

impl NotificationConfig {
    pub const MAX_POSITION: u8 = 6;

    fn positions(&self) -> [(NotificationField, u8); 6] {
        [
            (NotificationField::Published, self.show_published),
            (NotificationField::Size, self.show_size),
            (NotificationField::Category, self.show_category),
            (NotificationField::Downloads, self.show_downloads),
            (NotificationField::Seeders, self.show_seeders),
            (NotificationField::Leechers, self.show_leechers),
        ]
    }

    /// Visible fields in display order.
    pub fn ordered_fields(&self) -> Vec<NotificationField> {
        let mut visible: Vec<_> = self
            .positions()
            .into_iter()
            .filter(|(_, pos)| *pos > 0)
            .collect();
        visible.sort_by_key(|(_, pos)| *pos);
        visible.into_iter().map(|(field, _)| field).collect()
    }

    fn validate(&self, webhook: &str) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (field, pos) in self.positions() {
            if pos > Self::MAX_POSITION {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}' has show_{} = {} (expected 0 to {})",
                    webhook,
                    field.label().to_lowercase(),
                    pos,
                    Self::MAX_POSITION
                )));
            }
            if pos > 0 && !seen.insert(pos) {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}' uses position {} for more than one show_ field",
                    webhook, pos
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Starter file written on first run.
    pub const TEMPLATE: &'static str = r#"# Seconds between feed checks (minimum 60)
interval_secs = 600
downloads_dir = "/downloads"

[[subscriptions]]
owner = "Username"
rss = "https://nyaa.si/?page=rss&u=Username"

[[subscriptions.watchlist]]
name = "Example watchlist"
tags = ["1080p"]
regex = []
exclude_regex = []
webhooks = []

# [[webhooks]]
# name = "Example Webhook Name"
# url = "https://discord.com/api/webhooks/ID/TOKEN"
#
# [webhooks.notifications]
# title = ""
# description = ""
# show_published = 1
# show_size = 2
# show_category = 3
# show_downloads = 4
# show_seeders = 5
# show_leechers = 6
"#;

    const KNOWN_KEYS: [&'static str; 4] =
        ["interval_secs", "downloads_dir", "subscriptions", "webhooks"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Err(ConfigError::Missing)`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    ///
    /// The result is not validated; call [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            subscriptions = config.subscriptions.len(),
            webhooks = config.webhooks.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }
        Ok(toml::from_str(content)?)
    }

    /// Write [`Config::TEMPLATE`] to `path` without overwriting an existing file.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(Self::TEMPLATE.as_bytes())?;
        Ok(())
    }

    /// Apply `INTERVAL_SEC` and `DOWNLOADS_DIR` from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("INTERVAL_SEC").filter(|v| !v.trim().is_empty()) {
            self.interval_secs = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "INTERVAL_SEC must be a number of seconds, got '{raw}'"
                ))
            })?;
            tracing::debug!(
                interval_secs = self.interval_secs,
                "Interval overridden by environment"
            );
        }
        if let Some(dir) = lookup("DOWNLOADS_DIR").filter(|v| !v.trim().is_empty()) {
            self.downloads_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Check the configuration for values the watcher cannot run with.
    ///
    /// Webhook names referenced by a watchlist but not defined are only
    /// warned about; the notification is skipped at send time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "interval_secs must be at least {} (got {})",
                MIN_INTERVAL_SECS, self.interval_secs
            )));
        }

        if self.subscriptions.is_empty() {
            return Err(ConfigError::Invalid(
                "no subscriptions configured".to_string(),
            ));
        }

        let mut webhook_names = HashSet::new();
        for webhook in &self.webhooks {
            if webhook.name.trim().is_empty() {
                return Err(ConfigError::Invalid("a webhook has an empty name".to_string()));
            }
            if !webhook_names.insert(webhook.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}' is defined more than once",
                    webhook.name
                )));
            }
            webhook.notifications.validate(&webhook.name)?;
        }

        let mut owners = HashSet::new();
        for sub in &self.subscriptions {
            if sub.owner.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "subscription for '{}' has an empty owner",
                    sub.rss
                )));
            }
            if !owners.insert(sub.owner.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "subscription owner '{}' is used more than once",
                    sub.owner
                )));
            }
            validate_url(&sub.rss).map_err(|e| {
                ConfigError::Invalid(format!(
                    "subscription '{}' has an invalid rss URL: {}",
                    sub.owner, e
                ))
            })?;

            for rule in &sub.watchlist {
                let name = rule.name.as_deref().unwrap_or(crate::watcher::UNNAMED_RULE);
                if rule.tags.is_empty() && rule.regex.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "watchlist '{}' of '{}' has no tags or regex",
                        name, sub.owner
                    )));
                }
                for target in &rule.webhooks {
                    if !webhook_names.contains(target.as_str()) {
                        tracing::warn!(
                            owner = %sub.owner,
                            watchlist = %name,
                            webhook = %target,
                            "Watchlist references an undefined webhook"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Compile subscriptions, restoring persisted checkpoints by owner.
    pub fn build_subscriptions(
        &self,
        checkpoints: &HashMap<String, String>,
    ) -> Result<Vec<Subscription>, ConfigError> {
        self.subscriptions
            .iter()
            .map(|sub| {
                let rules = sub
                    .watchlist
                    .iter()
                    .map(|rule| {
                        WatchRule::compile(
                            rule.name.as_deref(),
                            &rule.tags,
                            &rule.regex,
                            &rule.exclude_regex,
                            &rule.webhooks,
                        )
                        .map_err(|source| ConfigError::Pattern {
                            owner: sub.owner.clone(),
                            rule: rule
                                .name
                                .clone()
                                .unwrap_or_else(|| crate::watcher::UNNAMED_RULE.to_string()),
                            source,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Subscription::new(&sub.owner, &sub.rss)
                    .with_rules(rules)
                    .with_checkpoint(checkpoints.get(&sub.owner).cloned()))
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
interval_secs = 900
downloads_dir = "/data/torrents"

[[subscriptions]]
owner = "Uploader"
rss = "https://nyaa.si/?page=rss&u=Uploader"

[[subscriptions.watchlist]]
name = "Show 720p"
tags = ["720p"]
regex = ['S01E\d+']
exclude_regex = ["CAM"]
webhooks = ["main"]

[[subscriptions]]
owner = "Everything"
rss = "https://example.com/rss"

[[webhooks]]
name = "main"
url = "https://discord.com/api/webhooks/123/secret-token"

[webhooks.notifications]
title = "New: $title"
show_seeders = 1
show_published = 2
show_size = 0
show_category = 0
show_downloads = 0
show_leechers = 0
"#;

    fn valid() -> Config {
        Config::from_toml(FULL).unwrap()
    }

    #[test]
    fn test_full_config_parses() {
        let config = valid();
        assert_eq!(config.interval_secs, 900);
        assert_eq!(config.downloads_dir, PathBuf::from("/data/torrents"));
        assert_eq!(config.subscriptions.len(), 2);
        assert_eq!(config.subscriptions[0].watchlist[0].regex, vec![r"S01E\d+"]);
        assert!(config.subscriptions[1].watchlist.is_empty());
        assert_eq!(config.webhooks[0].notifications.title, "New: $title");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_for_missing_keys() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.interval_secs, 600);
        assert_eq!(config.downloads_dir, PathBuf::from("/downloads"));
        let notifications = NotificationConfig::default();
        assert_eq!(notifications.ordered_fields().len(), 6);
    }

    #[test]
    fn test_template_parses_and_validates() {
        let config = Config::from_toml(Config::TEMPLATE).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let path = Path::new("/tmp/feedwatch_test_nonexistent_config.toml");
        assert!(matches!(Config::load(path), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_write_template_does_not_overwrite() {
        let dir = std::env::temp_dir().join("feedwatch_config_test_template");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::remove_file(&path).ok();

        Config::write_template(&path).unwrap();
        assert!(Config::write_template(&path).is_err());
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.subscriptions[0].owner, "Username");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedwatch_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_short_interval_rejected() {
        let mut config = valid();
        config.interval_secs = 30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rule_without_tags_or_regex_rejected() {
        let mut config = valid();
        config.subscriptions[0].watchlist[0].tags.clear();
        config.subscriptions[0].watchlist[0].regex.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no tags or regex"));
    }

    #[test]
    fn test_duplicate_owner_rejected() {
        let mut config = valid();
        config.subscriptions[1].owner = "Uploader".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_feed_rejected() {
        let mut config = valid();
        config.subscriptions[0].rss = "file:///etc/passwd".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_show_position_rejected() {
        let mut config = valid();
        config.webhooks[0].notifications.show_size = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn test_out_of_range_show_position_rejected() {
        let mut config = valid();
        config.webhooks[0].notifications.show_leechers = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ordered_fields_follow_positions() {
        let config = valid();
        assert_eq!(
            config.webhooks[0].notifications.ordered_fields(),
            vec![NotificationField::Seeders, NotificationField::Published]
        );
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = valid();
        config
            .apply_overrides(|key| match key {
                "INTERVAL_SEC" => Some("120".to_string()),
                "DOWNLOADS_DIR" => Some("/mnt/dl".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.interval_secs, 120);
        assert_eq!(config.downloads_dir, PathBuf::from("/mnt/dl"));
    }

    #[test]
    fn test_bad_interval_override_rejected() {
        let mut config = valid();
        let result =
            config.apply_overrides(|key| (key == "INTERVAL_SEC").then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_build_subscriptions_restores_checkpoints() {
        let config = valid();
        let checkpoints = HashMap::from([("Uploader".to_string(), "abc".to_string())]);
        let subs = config.build_subscriptions(&checkpoints).unwrap();

        assert_eq!(subs[0].checkpoint.as_deref(), Some("abc"));
        assert_eq!(subs[0].watch_rules[0].name, "Show 720p");
        assert_eq!(subs[0].watch_rules[0].delivery_targets, vec!["main".to_string()]);
        assert!(subs[1].checkpoint.is_none());
        assert!(subs[1].is_catch_all());
    }

    #[test]
    fn test_invalid_pattern_reported_with_rule_name() {
        let mut config = valid();
        config.subscriptions[0].watchlist[0].regex = vec!["(".to_string()];
        let err = config.build_subscriptions(&HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { ref rule, .. } if rule == "Show 720p"));
    }

    #[test]
    fn test_debug_masks_webhook_url() {
        let config = valid();
        let debug_output = format!("{:?}", config.webhooks[0]);
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[REDACTED]"));
        assert_eq!(
            config.webhooks[0].url(),
            "https://discord.com/api/webhooks/123/secret-token"
        );
    }
}
