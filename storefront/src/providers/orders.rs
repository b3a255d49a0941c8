//! Order backend provider trait.

use crate::error::Result;
use crate::types::{CreatedOrder, OrderDraft, OrderId, PaymentStatus};

/// Order endpoints of the storefront backend.
pub trait OrderApi: Send + Sync {
    /// `POST /orders`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects the order.
    fn create_order(
        &self,
        draft: &OrderDraft,
    ) -> impl std::future::Future<Output = Result<CreatedOrder>> + Send;

    /// `GET /orders/{id}/payment-status`: the backend's authoritative
    /// payment state for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the order is unknown.
    fn payment_status(
        &self,
        order_id: &OrderId,
    ) -> impl std::future::Future<Output = Result<PaymentStatus>> + Send;
}
