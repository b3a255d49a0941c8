//! Cart backend provider trait.

use crate::error::Result;
use crate::types::{AddToCartRequest, CartItemId, CartLineItem, CartSnapshot};

/// Cart endpoints of the storefront backend.
pub trait CartApi: Send + Sync {
    /// `GET /cart`: the caller's cart grouped by merchant.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is malformed.
    fn fetch_cart(&self) -> impl std::future::Future<Output = Result<CartSnapshot>> + Send;

    /// `POST /cart/items`: add units of a product.
    ///
    /// # Returns
    ///
    /// The resulting line (new, or an existing line with the increased quantity).
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it
    /// (for example, insufficient stock).
    fn add_item(
        &self,
        request: &AddToCartRequest,
    ) -> impl std::future::Future<Output = Result<CartLineItem>> + Send;

    /// `PATCH /cart/items/{id}`: set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it.
    fn update_item(
        &self,
        id: &CartItemId,
        quantity: u32,
    ) -> impl std::future::Future<Output = Result<CartLineItem>> + Send;

    /// `DELETE /cart/items/{id}`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it.
    fn remove_item(&self, id: &CartItemId) -> impl std::future::Future<Output = Result<()>> + Send;

    /// `DELETE /cart`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it.
    fn clear_cart(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
