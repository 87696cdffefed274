use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// Plain HTTP was used where HTTPS is required.
    #[error("Insecure URL: HTTPS required (except localhost for testing)")]
    Insecure,
}

/// Validates a URL string for use as a feed or download source.
///
/// Accepts only `http` and `https` URLs with a host. Feeds are commonly
/// self-hosted on the local network, so private addresses are allowed.
///
/// # Examples
///
/// ```
/// use feedwatch::util::validate_url;
///
/// let url = validate_url("https://nyaa.si/?page=rss&u=Someone").unwrap();
/// assert_eq!(url.host_str(), Some("nyaa.si"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Validates a URL that will carry a secret (webhook tokens).
///
/// Requires HTTPS; plain HTTP is allowed only for localhost so tests can
/// point at a local mock server.
pub fn validate_secure_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = validate_url(url_str)?;
    if url.scheme() == "https" {
        return Ok(url);
    }

    match url.host_str() {
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") => {
            tracing::warn!(host = ?url.host_str(), "Using non-HTTPS URL (localhost only)");
            Ok(url)
        }
        _ => Err(UrlValidationError::Insecure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_https_url() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
    }

    #[test]
    fn test_valid_http_url() {
        assert!(validate_url("http://example.com/feed.xml").is_ok());
    }

    #[test]
    fn test_private_hosts_allowed_for_feeds() {
        assert!(validate_url("http://192.168.1.10:8080/rss").is_ok());
        assert!(validate_url("http://localhost:9696/rss").is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_secure_url_requires_https() {
        assert!(validate_secure_url("https://discord.com/api/webhooks/1/t").is_ok());
        assert!(matches!(
            validate_secure_url("http://discord.com/api/webhooks/1/t"),
            Err(UrlValidationError::Insecure)
        ));
    }

    #[test]
    fn test_secure_url_allows_localhost_http() {
        assert!(validate_secure_url("http://127.0.0.1:8080/hook").is_ok());
        assert!(validate_secure_url("http://localhost/hook").is_ok());
    }
}
