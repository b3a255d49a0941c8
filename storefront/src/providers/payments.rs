//! Payment backend provider trait.

use crate::error::Result;
use crate::types::{MerchantId, PaymentForm, PaymentInitRequest, PaymentMethod};

/// Payment endpoints of the storefront backend.
pub trait PaymentApi: Send + Sync {
    /// `GET /shops/{id}/payment-methods`: methods the merchant has enabled.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is malformed.
    fn payment_methods(
        &self,
        merchant_id: &MerchantId,
    ) -> impl std::future::Future<Output = Result<Vec<PaymentMethod>>> + Send;

    /// `POST /payments/initiate`: obtain a signed gateway form.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the merchant has no gateway
    /// configured for the method.
    fn initiate_payment(
        &self,
        request: &PaymentInitRequest,
    ) -> impl std::future::Future<Output = Result<PaymentForm>> + Send;
}
