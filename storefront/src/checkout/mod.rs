//! Checkout flow for one merchant's cart lines.
//!
//! A checkout session starts from a frozen copy of the merchant's lines
//! and walks Address → Payment → Confirmation. Every session has a number;
//! results of requests issued by an earlier session are dropped, so
//! switching merchants mid-request cannot leak an order into the new flow.
//!
//! Cash on delivery completes immediately. Online methods persist the
//! order, fetch a signed gateway form and hand it to the
//! [`GatewayBridge`](crate::providers::GatewayBridge); the flow resumes at
//! Confirmation when the customer returns with a [`GatewayReturn`].

use crate::config::StorefrontConfig;
use crate::gateway::{FormPost, GatewayReturn};
use crate::notification::{Notification, NotificationLevel};
use crate::types::{
    CartLineItem, CreatedOrder, MerchantId, OrderData, OrderId, OrderTotals, PaymentForm,
    PaymentMethod, PaymentStatus,
};
use doko_core::environment::Clock;
use std::sync::Arc;

pub mod address;
pub mod reducer;
pub mod stage;

pub use address::{AddressField, AddressForm, ValidatedAddress};
pub use reducer::CheckoutReducer;
pub use stage::{CheckoutStage, StageId, StageTransition};

/// Dependencies of the checkout reducer.
///
/// # Type Parameters
///
/// - `B`: Order and payment backend
/// - `C`: Customer session
/// - `G`: Gateway bridge
/// - `P`: Pending-order storage
/// - `R`: Receipt sink
#[derive(Clone)]
pub struct CheckoutEnvironment<B, C, G, P, R> {
    /// Order and payment backend.
    pub api: B,
    /// Signed-in customer.
    pub session: C,
    /// Payment gateway hand-off.
    pub gateway: G,
    /// Storage for the order awaiting a gateway return.
    pub pending_orders: P,
    /// Receipt delivery.
    pub receipts: R,
    /// Order timestamps.
    pub clock: Arc<dyn Clock>,
    /// Return URLs, submission mode, notification TTL.
    pub config: StorefrontConfig,
}

impl<B, C, G, P, R> CheckoutEnvironment<B, C, G, P, R> {
    /// Create a checkout environment.
    #[must_use]
    pub fn new(
        api: B,
        session: C,
        gateway: G,
        pending_orders: P,
        receipts: R,
        clock: Arc<dyn Clock>,
        config: StorefrontConfig,
    ) -> Self {
        Self {
            api,
            session,
            gateway,
            pending_orders,
            receipts,
            clock,
            config,
        }
    }
}

/// Checkout actions.
///
/// Results carry the session number of the checkout that issued them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutAction {
    // Commands
    /// Fetch the merchant's enabled payment methods.
    LoadPaymentMethods,
    /// Change one address field.
    EditAddress {
        /// Field being edited.
        field: AddressField,
        /// New value.
        value: String,
    },
    /// Validate the address and continue to payment.
    SubmitAddress,
    /// Step back one stage.
    GoBack,
    /// Jump back to a stage from the progress indicator.
    GoToStage {
        /// Target stage; must not be ahead of the current one.
        stage: StageId,
    },
    /// Choose a payment method.
    SelectPaymentMethod {
        /// Chosen method.
        method: PaymentMethod,
    },
    /// Place the order.
    SubmitPayment,
    /// The customer came back from the gateway.
    GatewayReturned {
        /// Parsed return URL.
        gateway_return: GatewayReturn,
    },
    /// Produce a receipt for the confirmed order.
    DownloadReceipt,
    /// Leave the confirmation screen.
    Continue,
    /// Remove a notification.
    DismissNotification {
        /// Notification id.
        id: u64,
    },

    // Results
    /// A notification's display time ran out.
    NotificationExpired {
        /// Issuing session.
        session: u64,
        /// Notification id.
        id: u64,
    },
    /// Payment methods fetched.
    PaymentMethodsLoaded {
        /// Issuing session.
        session: u64,
        /// Enabled methods or error message.
        result: Result<Vec<PaymentMethod>, String>,
    },
    /// `POST /orders` settled.
    OrderCreated {
        /// Issuing session.
        session: u64,
        /// Created order ids or error message.
        result: Result<CreatedOrder, String>,
    },
    /// The pending order was stored and `POST /payments/initiate` settled.
    PaymentInitiated {
        /// Issuing session.
        session: u64,
        /// Order being paid.
        order_id: OrderId,
        /// Signed form or error message.
        result: Result<PaymentForm, String>,
    },
    /// The gateway bridge submitted (or failed to submit) the form.
    PaymentFormSubmitted {
        /// Issuing session.
        session: u64,
        /// Error message on failure.
        result: Result<(), String>,
    },
    /// The persisted pending order was read back after a gateway return.
    PendingOrderLoaded {
        /// Issuing session.
        session: u64,
        /// The return being resumed.
        gateway_return: GatewayReturn,
        /// Stored order, if any, or error message.
        result: Result<Option<OrderData>, String>,
    },
    /// `GET /orders/{id}/payment-status` settled.
    PaymentVerified {
        /// Issuing session.
        session: u64,
        /// Order checked.
        order_id: OrderId,
        /// Backend payment state or error message.
        result: Result<PaymentStatus, String>,
    },
    /// The receipt sink accepted (or rejected) a receipt.
    ReceiptDelivered {
        /// Issuing session.
        session: u64,
        /// Error message on failure.
        result: Result<(), String>,
    },
}

impl CheckoutAction {
    /// Session number carried by a result action.
    #[must_use]
    pub const fn session(&self) -> Option<u64> {
        match self {
            Self::NotificationExpired { session, .. }
            | Self::PaymentMethodsLoaded { session, .. }
            | Self::OrderCreated { session, .. }
            | Self::PaymentInitiated { session, .. }
            | Self::PaymentFormSubmitted { session, .. }
            | Self::PendingOrderLoaded { session, .. }
            | Self::PaymentVerified { session, .. }
            | Self::ReceiptDelivered { session, .. } => Some(*session),
            _ => None,
        }
    }
}

/// State of one checkout session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutState {
    /// Session number.
    pub session: u64,
    /// Merchant being checked out.
    pub merchant_id: MerchantId,
    /// Merchant display name.
    pub merchant_name: String,
    /// Frozen copy of the merchant's cart lines.
    pub items: Vec<CartLineItem>,
    /// Order summary totals.
    pub totals: OrderTotals,
    /// Current stage.
    pub stage: CheckoutStage,
    /// Address draft and errors.
    pub address: AddressForm,
    /// Methods the merchant accepts.
    pub available_methods: Vec<PaymentMethod>,
    /// Payment methods are being fetched.
    pub methods_loading: bool,
    /// Selected payment method.
    pub payment_method: Option<PaymentMethod>,
    /// An order submission is in progress.
    pub processing: bool,
    /// Order created for an online payment, awaiting the gateway.
    pub pending_order: Option<OrderData>,
    /// Form handed to the gateway bridge.
    pub payment_form: Option<FormPost>,
    /// Transient notifications, oldest first.
    pub notifications: Vec<Notification>,
    /// The customer left the confirmation screen.
    pub finished: bool,
    next_notification_id: u64,
}

impl CheckoutState {
    /// A fresh session for `items` of one merchant.
    ///
    /// The address form starts empty apart from `email` and `country`.
    #[must_use]
    pub fn new(
        session: u64,
        merchant_id: MerchantId,
        items: Vec<CartLineItem>,
        email: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        let merchant_name = items
            .first()
            .map(|line| line.merchant_name.clone())
            .unwrap_or_default();
        let totals = OrderTotals::from_items(&items);
        Self {
            session,
            merchant_id,
            merchant_name,
            items,
            totals,
            stage: CheckoutStage::Address,
            address: AddressForm::new(email, country),
            ..Self::default()
        }
    }

    /// An empty session that will adopt a persisted order.
    #[must_use]
    pub fn resuming(session: u64, country: impl Into<String>) -> Self {
        Self {
            session,
            address: AddressForm::new(String::new(), country),
            ..Self::default()
        }
    }

    /// The order shown on the confirmation stage.
    #[must_use]
    pub const fn order(&self) -> Option<&OrderData> {
        self.stage.order()
    }

    /// Whether the stage can be left by going back.
    #[must_use]
    pub fn can_go_back(&self) -> bool {
        !self.stage.is_terminal()
    }

    /// Queue a notification and return its id.
    pub(crate) fn notify(
        &mut self,
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> u64 {
        self.next_notification_id += 1;
        let id = self.next_notification_id;
        self.notifications
            .push(Notification::new(id, level, title, message));
        id
    }

    /// Load the lines and totals of an order restored after a reload.
    pub(crate) fn adopt_order(&mut self, order: &OrderData) {
        self.merchant_id = order.merchant_id.clone();
        if let Some(line) = order.items.first() {
            self.merchant_name = line.merchant_name.clone();
        }
        self.items = order.items.clone();
        self.totals = OrderTotals::from_items(&self.items);
        self.payment_method = Some(order.payment_method);
    }
}
