//! Feed retrieval and parsing.
//!
//! - [`parser`] - RSS/Atom parsing with `feed-rs`, plus a `quick-xml` pass
//!   for torrent-index extension elements (infohash, seeders, size, ...)
//! - [`fetcher`] - HTTP retrieval with timeouts, retry/backoff and a body
//!   size limit

mod fetcher;
mod parser;

pub use fetcher::{build_client, fetch_all, fetch_bytes, fetch_feed, FetchError, FetchPolicy};
pub use parser::parse_feed;
