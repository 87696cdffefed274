use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{NotificationField, WebhookConfig};
use crate::util::{validate_secure_url, UrlValidationError};
use crate::watcher::DeliveryItem;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MISSING_VALUE: &str = "N/A";

/// Template tags understood by [`insert_tags`], without the leading `$`.
const TAGS: [&str; 10] = [
    "webhook",
    "title",
    "downloads",
    "seeders",
    "leechers",
    "size",
    "published",
    "category",
    "uploader",
    "watchlist",
];

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Unknown webhook: {0}")]
    UnknownWebhook(String),
    /// The URL carries a token, so only HTTPS (or localhost) is accepted
    #[error("Webhook '{name}' has an unusable URL: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: UrlValidationError,
    },
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Webhook '{name}' returned status {status}")]
    HttpStatus { name: String, status: u16 },
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Replace `$tag` placeholders in a notification template.
///
/// Missing metadata renders as `N/A`; `$watchlist` is empty for catch-all
/// subscriptions.
///
/// ```
/// use feedwatch::notify::insert_tags;
/// use feedwatch::watcher::{DeliveryItem, FeedItem};
///
/// let delivery = DeliveryItem {
///     item: FeedItem { title: "Show - 01".into(), ..Default::default() },
///     owner: "Uploader".into(),
///     matched_rule: Some("Show".into()),
///     delivery_targets: vec![],
/// };
/// assert_eq!(
///     insert_tags("$title from $uploader ($watchlist)", "main", &delivery),
///     "Show - 01 from Uploader (Show)"
/// );
/// ```
pub fn insert_tags(template: &str, webhook_name: &str, delivery: &DeliveryItem) -> String {
    let meta = &delivery.item.meta;
    let or_missing = |v: &Option<String>| v.as_deref().unwrap_or(MISSING_VALUE).to_string();

    // Values are inserted verbatim: a `$tag` inside a title stays literal.
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let Some(tag) = TAGS.iter().find(|tag| after.starts_with(*tag)) else {
            out.push('$');
            rest = after;
            continue;
        };
        let value = match *tag {
            "webhook" => webhook_name.to_string(),
            "title" => delivery.item.title.clone(),
            "downloads" => or_missing(&meta.downloads),
            "seeders" => or_missing(&meta.seeders),
            "leechers" => or_missing(&meta.leechers),
            "size" => or_missing(&meta.size),
            "published" => format_published(delivery.item.published_at),
            "category" => or_missing(&meta.category),
            "uploader" => delivery.owner.clone(),
            _ => delivery.matched_rule.clone().unwrap_or_default(),
        };
        out.push_str(&value);
        rest = &after[tag.len()..];
    }
    out.push_str(rest);
    out
}

/// Publish time to the minute, e.g. `Tue, 02 Jan 2024 12:30`.
fn format_published(published: Option<DateTime<Utc>>) -> String {
    published
        .map(|dt| dt.format("%a, %d %b %Y %H:%M").to_string())
        .unwrap_or_else(|| MISSING_VALUE.to_string())
}

fn field_value(field: NotificationField, delivery: &DeliveryItem) -> String {
    let meta = &delivery.item.meta;
    let value = match field {
        NotificationField::Published => return format_published(delivery.item.published_at),
        NotificationField::Size => &meta.size,
        NotificationField::Category => &meta.category,
        NotificationField::Downloads => &meta.downloads,
        NotificationField::Seeders => &meta.seeders,
        NotificationField::Leechers => &meta.leechers,
    };
    value.clone().unwrap_or_else(|| MISSING_VALUE.to_string())
}

/// Discord-compatible embed payload for one delivered item.
pub fn build_payload(webhook: &WebhookConfig, delivery: &DeliveryItem) -> Value {
    let notifications = &webhook.notifications;

    let title = if notifications.title.is_empty() {
        format!("Downloading New Torrent: {}", delivery.item.title)
    } else {
        insert_tags(&notifications.title, &webhook.name, delivery)
    };

    let fields: Vec<Value> = notifications
        .ordered_fields()
        .into_iter()
        .map(|field| {
            json!({
                "name": field.label(),
                "value": field_value(field, delivery),
                "inline": true,
            })
        })
        .collect();

    let mut embed = json!({
        "title": title,
        "fields": fields,
    });
    if !notifications.description.is_empty() {
        embed["description"] = json!(insert_tags(
            &notifications.description,
            &webhook.name,
            delivery
        ));
    }
    if let Some(page) = &delivery.item.meta.page {
        embed["url"] = json!(page);
    }

    json!({ "embeds": [embed] })
}

/// Sends delivery notifications to the configured webhooks.
pub struct Notifier {
    client: reqwest::Client,
    webhooks: Vec<WebhookConfig>,
}

impl Notifier {
    pub fn new(client: reqwest::Client, webhooks: Vec<WebhookConfig>) -> Self {
        Self { client, webhooks }
    }

    pub fn webhook(&self, name: &str) -> Option<&WebhookConfig> {
        self.webhooks.iter().find(|w| w.name == name)
    }

    /// Post one notification.
    pub async fn send(
        &self,
        webhook_name: &str,
        delivery: &DeliveryItem,
    ) -> Result<(), NotifyError> {
        let webhook = self
            .webhook(webhook_name)
            .ok_or_else(|| NotifyError::UnknownWebhook(webhook_name.to_string()))?;
        let url = validate_secure_url(webhook.url()).map_err(|source| NotifyError::InvalidUrl {
            name: webhook.name.clone(),
            source,
        })?;

        let body = serde_json::to_vec(&build_payload(webhook, delivery))?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus {
                name: webhook.name.clone(),
                status: response.status().as_u16(),
            });
        }

        tracing::debug!(webhook = %webhook.name, title = %delivery.item.title, "Notification sent");
        Ok(())
    }

    /// Notify every delivery target of `delivery`. Failures are logged, not
    /// returned. Returns the number of notifications sent.
    pub async fn notify_targets(&self, delivery: &DeliveryItem) -> usize {
        let mut sent = 0;
        for target in &delivery.delivery_targets {
            match self.send(target, delivery).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        webhook = %target,
                        title = %delivery.item.title,
                        error = %e,
                        "Webhook notification failed"
                    );
                }
            }
        }
        sent
    }
}
