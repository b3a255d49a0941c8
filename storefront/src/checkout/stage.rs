//! Checkout stages and the transitions between them.
//!
//! Each stage carries the evidence needed to be in it: the payment stage
//! holds a [`ValidatedAddress`], the confirmation stage additionally holds
//! the [`OrderData`] that was created.
//!
//! ```text
//!            SubmitAddress            PlaceOrder
//!  Address ───────────────► Payment ─────────────► Confirmation
//!     ▲                       │ ▲                       │
//!     └──────── Back ─────────┘ └──────── Back ─────────┘   (not after a completed order)
//!
//!  Address | Payment ── ResumeFromGateway ──► Confirmation
//! ```

use super::address::ValidatedAddress;
use crate::error::{Result, StorefrontError};
use crate::types::{OrderData, PaymentStatus};
use std::fmt;

/// Stage number, as shown in the progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    /// Shipping information.
    Address = 1,
    /// Payment method selection.
    Payment = 2,
    /// Order confirmation.
    Confirmation = 3,
}

impl StageId {
    /// Progress indicator label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Address => "Address",
            Self::Payment => "Payment",
            Self::Confirmation => "Confirmation",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Current checkout stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckoutStage {
    /// Collecting the shipping address.
    #[default]
    Address,
    /// Choosing how to pay.
    Payment {
        /// Address accepted by validation.
        address: ValidatedAddress,
    },
    /// Showing the placed order.
    Confirmation {
        /// Address the order ships to.
        address: ValidatedAddress,
        /// The created order.
        order: OrderData,
    },
}

impl CheckoutStage {
    /// Stage number.
    #[must_use]
    pub const fn id(&self) -> StageId {
        match self {
            Self::Address => StageId::Address,
            Self::Payment { .. } => StageId::Payment,
            Self::Confirmation { .. } => StageId::Confirmation,
        }
    }

    /// Validated address, once past the address stage.
    #[must_use]
    pub const fn address(&self) -> Option<&ValidatedAddress> {
        match self {
            Self::Address => None,
            Self::Payment { address } | Self::Confirmation { address, .. } => Some(address),
        }
    }

    /// The order shown on the confirmation stage.
    #[must_use]
    pub const fn order(&self) -> Option<&OrderData> {
        match self {
            Self::Confirmation { order, .. } => Some(order),
            _ => None,
        }
    }

    /// Mutable access to the confirmed order.
    pub fn order_mut(&mut self) -> Option<&mut OrderData> {
        match self {
            Self::Confirmation { order, .. } => Some(order),
            _ => None,
        }
    }

    /// Whether the flow can no longer move: a confirmed, completed order.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.order()
            .is_some_and(|order| order.payment_status == PaymentStatus::Completed)
    }

    /// Navigate back to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidTransition`] if `target` is ahead of
    /// the current stage or the current stage is terminal.
    pub fn go_back(&self, target: StageId) -> Result<Self> {
        if !StageTransition::Back.permits(self, target) {
            return Err(StorefrontError::InvalidTransition(format!(
                "cannot go back from {} to {target}",
                self.id()
            )));
        }

        Ok(match (target, self) {
            (StageId::Address, _) => Self::Address,
            (StageId::Payment, Self::Payment { address } | Self::Confirmation { address, .. }) => {
                Self::Payment {
                    address: address.clone(),
                }
            },
            _ => self.clone(),
        })
    }
}

/// Kinds of stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTransition {
    /// Address → Payment, guarded by address validation.
    SubmitAddress,
    /// Payment → Confirmation, guarded by order creation.
    PlaceOrder,
    /// Address or Payment → Confirmation when the customer comes back
    /// from a payment gateway.
    ResumeFromGateway,
    /// Any stage → an earlier (or the same) stage.
    Back,
}

impl StageTransition {
    /// Whether this transition may take `from` to `to`.
    ///
    /// Guards on the evidence itself (a validated address, a created order)
    /// are enforced by the types of [`CheckoutStage`]; this table only
    /// covers the edges.
    #[must_use]
    pub fn permits(self, from: &CheckoutStage, to: StageId) -> bool {
        let at = from.id();
        match self {
            Self::SubmitAddress => at == StageId::Address && to == StageId::Payment,
            Self::PlaceOrder => at == StageId::Payment && to == StageId::Confirmation,
            Self::ResumeFromGateway => to == StageId::Confirmation && !from.is_terminal(),
            Self::Back => to <= at && !from.is_terminal(),
        }
    }
}
