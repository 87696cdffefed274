//! Outbound webhook notifications for delivered items.

mod webhook;

pub use webhook::{build_payload, insert_tags, Notifier, NotifyError};
