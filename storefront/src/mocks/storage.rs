//! In-memory pending-order storage.

use crate::error::{Result, StorefrontError};
use crate::providers::PendingOrderStore;
use crate::types::OrderData;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Pending-order store holding the serialized order, like browser
/// session storage does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPendingOrders {
    slot: Arc<Mutex<Option<String>>>,
}

impl InMemoryPendingOrders {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the raw stored value.
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
    }

    /// Whether an order is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl PendingOrderStore for InMemoryPendingOrders {
    fn save(&self, order: &OrderData) -> impl Future<Output = Result<()>> + Send {
        let slot = Arc::clone(&self.slot);
        let serialized =
            serde_json::to_string(order).map_err(|e| StorefrontError::Storage(e.to_string()));

        async move {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(serialized?);
            Ok(())
        }
    }

    fn load(&self) -> impl Future<Output = Result<Option<OrderData>>> + Send {
        let raw = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        async move {
            raw.map(|raw| {
                serde_json::from_str(&raw).map_err(|e| StorefrontError::Storage(e.to_string()))
            })
            .transpose()
        }
    }

    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        let slot = Arc::clone(&self.slot);

        async move {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
            Ok(())
        }
    }
}
