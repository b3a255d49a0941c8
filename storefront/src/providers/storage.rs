//! Pending-order storage provider trait.

use crate::error::Result;
use crate::types::OrderData;

/// Session-scoped storage for the order awaiting a gateway return.
///
/// The gateway round-trip may reload the host, so the order is written here
/// before the hand-off and read back when the customer returns.
pub trait PendingOrderStore: Send + Sync {
    /// Persist the pending order, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the storage backend fails.
    fn save(&self, order: &OrderData) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read the pending order.
    ///
    /// # Errors
    ///
    /// Returns error if the storage backend fails or the stored value is corrupt.
    fn load(&self) -> impl std::future::Future<Output = Result<Option<OrderData>>> + Send;

    /// Forget the pending order.
    ///
    /// # Errors
    ///
    /// Returns error if the storage backend fails.
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
