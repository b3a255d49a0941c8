//! Receipt delivery provider trait.

use crate::error::Result;
use crate::receipt::Receipt;

/// Hands a rendered receipt to the host (download, share sheet, printer).
pub trait ReceiptSink: Send + Sync {
    /// Deliver a receipt.
    ///
    /// # Errors
    ///
    /// Returns error if the host could not deliver the document.
    fn deliver(&self, receipt: Receipt) -> impl std::future::Future<Output = Result<()>> + Send;
}
