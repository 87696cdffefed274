//! Utility functions for common operations.
//!
//! - **URL validation**: scheme checks for feeds, HTTPS enforcement for webhooks
//! - **Text processing**: control-character stripping, file-name sanitizing,
//!   human-readable intervals

mod text;
mod url_validator;

pub use text::{format_interval, plural, sanitize_file_name, strip_control_chars};
pub use url_validator::{validate_secure_url, validate_url, UrlValidationError};
