use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use crate::feed::parser::parse_feed;
use crate::watcher::{FeedItem, Subscription};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed or a torrent file.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the policy timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Timeouts and retry budget for outbound requests.
///
/// Rate limiting (429), server errors (5xx) and truncated bodies are retried
/// with exponential backoff: `base_delay`, `2 * base_delay`, `4 * base_delay`.
/// Other 4xx responses fail immediately.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_body_bytes: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_body_bytes: MAX_FEED_SIZE,
        }
    }
}

impl FetchPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Build the shared HTTP client.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("feedwatch/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Fetch and parse one feed.
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Request exceeded the policy timeout
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::RateLimited`] - 429 response after max retries
/// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
/// - [`FetchError::Parse`] - Invalid RSS/Atom XML
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<Vec<FeedItem>, FetchError> {
    let bytes = fetch_bytes(client, url, policy).await?;
    parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Fetch every subscription's feed sequentially, keyed by owner.
///
/// Owners whose fetch failed are absent from the map; the error is logged
/// and the watcher treats the subscription as having no entries this tick.
pub async fn fetch_all(
    client: &reqwest::Client,
    subscriptions: &[Subscription],
    policy: &FetchPolicy,
) -> HashMap<String, Vec<FeedItem>> {
    let mut feeds = HashMap::with_capacity(subscriptions.len());

    for sub in subscriptions {
        match fetch_feed(client, &sub.feed_url, policy).await {
            Ok(entries) => {
                tracing::debug!(owner = %sub.owner, entries = entries.len(), "Fetched feed");
                feeds.insert(sub.owner.clone(), entries);
            }
            Err(e) => {
                tracing::warn!(
                    owner = %sub.owner,
                    url = %sub.feed_url,
                    error = %e,
                    "Feed fetch failed"
                );
            }
        }
    }

    feeds
}

/// GET `url` and return the body, retrying per `policy`.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(policy.timeout, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= policy.max_retries {
                return Err(FetchError::RateLimited(policy.max_retries));
            }

            let delay = policy.backoff(retry_count);
            tracing::warn!(
                url = %url,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if response.status().is_server_error() {
            if retry_count >= policy.max_retries {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            let delay = policy.backoff(retry_count);
            tracing::warn!(
                url = %url,
                status = %response.status(),
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Server error, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        match read_limited_bytes(response, policy.max_body_bytes).await {
            Ok(bytes) => return Ok(bytes),
            Err(FetchError::IncompleteResponse { expected, received }) => {
                if retry_count >= policy.max_retries {
                    return Err(FetchError::IncompleteResponse { expected, received });
                }

                let delay = policy.backoff(retry_count);
                tracing::debug!(
                    url = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn fast_policy() -> FetchPolicy {
        FetchPolicy {
            base_delay: Duration::from_millis(1),
            ..FetchPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let items = fetch_feed(&client, &url, &fast_policy()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identifier, "1");
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        match fetch_feed(&client, &url, &fast_policy()).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_error_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // Initial request + 3 retries
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        match fetch_feed(&client, &url, &fast_policy()).await {
            Err(FetchError::HttpStatus(500)) => {}
            other => panic!("Expected HttpStatus(500), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_503_retry_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let items = fetch_feed(&client, &url, &fast_policy()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_after_max_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        match fetch_feed(&client, &url, &fast_policy()).await {
            Err(FetchError::RateLimited(3)) => {}
            other => panic!("Expected RateLimited(3), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_response_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let policy = FetchPolicy {
            max_body_bytes: 1024,
            ..fast_policy()
        };
        let url = format!("{}/feed", mock_server.uri());
        assert!(matches!(
            fetch_bytes(&client, &url, &policy).await,
            Err(FetchError::ResponseTooLarge)
        ));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        match fetch_feed(&client, &url, &fast_policy()).await {
            Err(FetchError::Parse(_)) => {}
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_omits_failed_owners() {
        let mock_server = MockServer::start().await;
        Mock::given(path("/good"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;
        Mock::given(path("/bad"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let subs = vec![
            Subscription::new("Good", format!("{}/good", mock_server.uri())),
            Subscription::new("Bad", format!("{}/bad", mock_server.uri())),
        ];
        let client = reqwest::Client::new();
        let feeds = fetch_all(&client, &subs, &fast_policy()).await;

        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds["Good"].len(), 1);
        assert!(!feeds.contains_key("Bad"));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
    }
}
