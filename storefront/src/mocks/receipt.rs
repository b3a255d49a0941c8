//! Recording receipt sink.

use crate::error::Result;
use crate::providers::ReceiptSink;
use crate::receipt::Receipt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Receipt sink that keeps every delivered receipt.
#[derive(Debug, Clone, Default)]
pub struct RecordingReceiptSink {
    receipts: Arc<Mutex<Vec<Receipt>>>,
}

impl RecordingReceiptSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receipts delivered so far.
    #[must_use]
    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReceiptSink for RecordingReceiptSink {
    fn deliver(&self, receipt: Receipt) -> impl Future<Output = Result<()>> + Send {
        let receipts = Arc::clone(&self.receipts);

        async move {
            receipts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(receipt);
            Ok(())
        }
    }
}
