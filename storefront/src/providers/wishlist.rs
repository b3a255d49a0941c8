//! Wishlist backend provider trait.

use crate::error::Result;
use crate::types::{ProductId, WishlistItem};

/// Wishlist endpoints of the storefront backend.
pub trait WishlistApi: Send + Sync {
    /// `GET /wishlist`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is malformed.
    fn fetch_wishlist(&self)
    -> impl std::future::Future<Output = Result<Vec<WishlistItem>>> + Send;

    /// `POST /wishlist/{productId}`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it.
    fn add_to_wishlist(
        &self,
        product_id: &ProductId,
    ) -> impl std::future::Future<Output = Result<WishlistItem>> + Send;

    /// `DELETE /wishlist/{productId}`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it.
    fn remove_from_wishlist(
        &self,
        product_id: &ProductId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// `DELETE /wishlist`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it.
    fn clear_wishlist(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// `GET /wishlist/check/{productId}`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is malformed.
    fn is_in_wishlist(
        &self,
        product_id: &ProductId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}
