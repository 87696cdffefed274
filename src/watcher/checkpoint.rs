use super::types::Subscription;

/// Advance the subscription's checkpoint to the newest scanned identifier.
///
/// A `None` (empty or failed fetch) leaves the checkpoint untouched.
/// Returns whether the checkpoint changed.
pub fn commit(subscription: &mut Subscription, newest: Option<String>) -> bool {
    match newest {
        Some(id) if subscription.checkpoint.as_deref() != Some(id.as_str()) => {
            tracing::debug!(owner = %subscription.owner, checkpoint = %id, "Advanced checkpoint");
            subscription.checkpoint = Some(id);
            true
        }
        _ => false,
    }
}
