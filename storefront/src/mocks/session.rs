//! Mock customer session.

use crate::providers::CustomerSession;
use crate::types::Customer;
use std::sync::{Arc, Mutex, PoisonError};

/// Customer session whose signed-in state tests can flip.
#[derive(Debug, Clone, Default)]
pub struct MockCustomerSession {
    customer: Arc<Mutex<Option<Customer>>>,
}

impl MockCustomerSession {
    /// A session with nobody signed in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session signed in as `email`.
    #[must_use]
    pub fn signed_in(email: impl Into<String>) -> Self {
        let session = Self::default();
        session.sign_in(email);
        session
    }

    /// Sign in as `email`.
    pub fn sign_in(&self, email: impl Into<String>) {
        *self.customer.lock().unwrap_or_else(PoisonError::into_inner) = Some(Customer {
            email: email.into(),
            name: None,
        });
    }

    /// Sign out.
    pub fn sign_out(&self) {
        *self.customer.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CustomerSession for MockCustomerSession {
    fn current_customer(&self) -> Option<Customer> {
        self.customer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
