//! RSS torrent watcher: polls feeds, matches new uploads against per-feed
//! watchlists, downloads the `.torrent` files and posts webhook notifications.
//!
//! The matching and deduplication core lives in [`watcher`] and performs no
//! I/O; the other modules are the service around it.

pub mod config;
pub mod download;
pub mod feed;
pub mod notify;
pub mod runner;
pub mod storage;
pub mod util;
pub mod watcher;
