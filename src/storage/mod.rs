mod history;
mod schema;
mod subscriptions;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, HistoryCounts, HistoryEntry, HistoryKind, NewHistoryEntry};
