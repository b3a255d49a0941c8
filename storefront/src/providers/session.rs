//! Customer session provider trait.

use crate::types::Customer;

/// Read access to the signed-in customer.
///
/// Token storage and refresh belong to the host's auth layer; checkout only
/// needs to know whether someone is signed in and their email.
pub trait CustomerSession: Send + Sync {
    /// The signed-in customer, if any.
    fn current_customer(&self) -> Option<Customer>;
}
