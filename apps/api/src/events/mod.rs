//! Refresh event publication
//!
//! Services announce which resources changed through [`EventNotifier`].
//! [`EventBroker`] fans events out over Redis pub/sub when available and
//! through an in-process broadcast channel otherwise.

mod broker;

use async_trait::async_trait;

use crate::models::RefreshEvent;

pub use broker::EventBroker;

/// Publishes refresh events to interested subscribers
///
/// Publication is best-effort: failures are logged by the implementation
/// and never reported back to the caller.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn publish(&self, event: RefreshEvent);
}
