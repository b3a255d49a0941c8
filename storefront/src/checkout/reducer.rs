//! Checkout reducer.

use super::address::{AddressForm, ValidatedAddress};
use super::stage::{CheckoutStage, StageId, StageTransition};
use super::{CheckoutAction, CheckoutEnvironment, CheckoutState};
use crate::error::{Result, StorefrontError};
use crate::gateway::{FormPost, GatewayReturn, ReturnStatus};
use crate::notification::NotificationLevel;
use crate::providers::{
    CustomerSession, GatewayBridge, OrderApi, PaymentApi, PendingOrderStore, ReceiptSink,
};
use crate::receipt::Receipt;
use crate::types::{
    CreatedOrder, OrderData, OrderDraft, OrderId, OrderLineRequest, PaymentForm,
    PaymentInitRequest, PaymentMethod, PaymentStatus, to_minor_units,
};
use chrono::{DateTime, Utc};
use doko_core::effect::Effect;
use doko_core::reducer::Reducer;
use doko_core::{SmallVec, async_effect, delay, smallvec};
use reqwest::Url;
use std::marker::PhantomData;
use tracing::{debug, info, warn};

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

const TITLE_AUTH_REQUIRED: &str = "Authentication Required";
const TITLE_PAYMENT_ERROR: &str = "Payment Error";
const TITLE_PROCESS_FAILED: &str = "Process Failed";
const TITLE_PAYMENT_FAILED: &str = "Payment Failed";

/// Reducer for [`CheckoutState`].
///
/// # Type Parameters
///
/// - `B`: Order and payment backend
/// - `C`: Customer session
/// - `G`: Gateway bridge
/// - `P`: Pending-order storage
/// - `R`: Receipt sink
#[derive(Debug)]
pub struct CheckoutReducer<B, C, G, P, R> {
    _phantom: PhantomData<fn() -> (B, C, G, P, R)>,
}

impl<B, C, G, P, R> CheckoutReducer<B, C, G, P, R> {
    /// Create a new checkout reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B, C, G, P, R> Default for CheckoutReducer<B, C, G, P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, C, G, P, R> Clone for CheckoutReducer<B, C, G, P, R> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

/// Queue a notification; schedules its expiry when a TTL is configured.
fn notify<B, C, G, P, R>(
    state: &mut CheckoutState,
    env: &CheckoutEnvironment<B, C, G, P, R>,
    level: NotificationLevel,
    title: &str,
    message: impl Into<String>,
) -> Effect<CheckoutAction> {
    let id = state.notify(level, title, message);
    match env.config.notification_ttl {
        Some(duration) => delay! {
            duration: duration,
            action: CheckoutAction::NotificationExpired {
                session: state.session,
                id,
            }
        },
        None => Effect::None,
    }
}

fn build_draft(
    state: &CheckoutState,
    address: &ValidatedAddress,
    payment_method: PaymentMethod,
) -> OrderDraft {
    OrderDraft {
        merchant_id: state.merchant_id.clone(),
        items: state.items.iter().map(OrderLineRequest::from).collect(),
        shipping_address: address.get().clone(),
        payment_method,
        subtotal: state.totals.subtotal,
        delivery_fee: state.totals.delivery_fee,
        total: state.totals.total,
    }
}

fn build_order(
    state: &CheckoutState,
    address: &ValidatedAddress,
    payment_method: PaymentMethod,
    created: CreatedOrder,
    order_date: DateTime<Utc>,
) -> OrderData {
    OrderData {
        order_id: created.id,
        order_number: created.order_number,
        merchant_id: state.merchant_id.clone(),
        items: state.items.clone(),
        shipping_address: address.get().clone(),
        payment_method,
        payment_status: if payment_method.is_online() {
            PaymentStatus::Initiated
        } else {
            PaymentStatus::Completed
        },
        subtotal: state.totals.subtotal,
        delivery_fee: state.totals.delivery_fee,
        total: state.totals.total,
        order_date,
        transaction_id: None,
    }
}

fn payment_request<B, C, G, P, R>(
    env: &CheckoutEnvironment<B, C, G, P, R>,
    order: &OrderData,
) -> Result<PaymentInitRequest> {
    Ok(PaymentInitRequest {
        merchant_id: order.merchant_id.clone(),
        order_id: order.order_id.clone(),
        payment_method: order.payment_method,
        amount_minor: to_minor_units(order.total)?,
        return_url: env
            .config
            .return_url(ReturnStatus::Success, &order.order_id)?
            .to_string(),
        failure_url: env
            .config
            .return_url(ReturnStatus::Failure, &order.order_id)?
            .to_string(),
    })
}

/// The order a gateway return refers to, if `order` is it.
fn return_matches(gateway_return: &GatewayReturn, order: &OrderData) -> bool {
    gateway_return
        .order_id
        .as_ref()
        .is_none_or(|id| id == &order.order_id)
}

// ═══════════════════════════════════════════════════════════════════════
// Effects
// ═══════════════════════════════════════════════════════════════════════

impl<B, C, G, P, R> CheckoutReducer<B, C, G, P, R>
where
    B: OrderApi + PaymentApi + Clone + 'static,
    C: CustomerSession,
    G: GatewayBridge + Clone + 'static,
    P: PendingOrderStore + Clone + 'static,
    R: ReceiptSink + Clone + 'static,
{
    fn load_methods_effect(
        state: &CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
    ) -> Effect<CheckoutAction> {
        let api = env.api.clone();
        let session = state.session;
        let merchant_id = state.merchant_id.clone();
        Effect::Future(Box::pin(async move {
            let result = api
                .payment_methods(&merchant_id)
                .await
                .map_err(|e| e.to_string());
            Some(CheckoutAction::PaymentMethodsLoaded { session, result })
        }))
    }

    fn create_order_effect(
        session: u64,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        draft: OrderDraft,
    ) -> Effect<CheckoutAction> {
        let api = env.api.clone();
        async_effect! {
            let result = api.create_order(&draft).await.map_err(|e| e.to_string());
            Some(CheckoutAction::OrderCreated { session, result })
        }
    }

    /// Persist the pending order, then request the signed gateway form.
    fn initiate_payment_effect(
        session: u64,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        order: OrderData,
        request: PaymentInitRequest,
    ) -> Effect<CheckoutAction> {
        let api = env.api.clone();
        let pending_orders = env.pending_orders.clone();
        Effect::Future(Box::pin(async move {
            if let Err(e) = pending_orders.save(&order).await {
                warn!(order_id = %order.order_id, error = %e, "Failed to persist pending order");
            }
            let result = api
                .initiate_payment(&request)
                .await
                .map_err(|e| e.to_string());
            Some(CheckoutAction::PaymentInitiated {
                session,
                order_id: order.order_id,
                result,
            })
        }))
    }

    fn submit_form_effect(
        session: u64,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        post: FormPost,
    ) -> Effect<CheckoutAction> {
        let gateway = env.gateway.clone();
        let mode = env.config.submission_mode;
        Effect::Future(Box::pin(async move {
            let result = gateway.submit(post, mode).await.map_err(|e| e.to_string());
            Some(CheckoutAction::PaymentFormSubmitted { session, result })
        }))
    }

    fn load_pending_effect(
        session: u64,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        gateway_return: GatewayReturn,
    ) -> Effect<CheckoutAction> {
        let pending_orders = env.pending_orders.clone();
        async_effect! {
            let result = pending_orders.load().await.map_err(|e| e.to_string());
            Some(CheckoutAction::PendingOrderLoaded {
                session,
                gateway_return,
                result,
            })
        }
    }

    fn verify_effect(
        session: u64,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        order_id: OrderId,
    ) -> Effect<CheckoutAction> {
        let api = env.api.clone();
        Effect::Future(Box::pin(async move {
            let result = api
                .payment_status(&order_id)
                .await
                .map_err(|e| e.to_string());
            Some(CheckoutAction::PaymentVerified {
                session,
                order_id,
                result,
            })
        }))
    }

    fn clear_pending_effect(env: &CheckoutEnvironment<B, C, G, P, R>) -> Effect<CheckoutAction> {
        let pending_orders = env.pending_orders.clone();
        Effect::Future(Box::pin(async move {
            if let Err(e) = pending_orders.clear().await {
                warn!(error = %e, "Failed to clear pending order");
            }
            None
        }))
    }

    fn replace_location_effect(
        env: &CheckoutEnvironment<B, C, G, P, R>,
        url: Url,
    ) -> Effect<CheckoutAction> {
        let gateway = env.gateway.clone();
        Effect::Future(Box::pin(async move {
            if let Err(e) = gateway.replace_location(&url) {
                warn!(%url, error = %e, "Failed to clean return URL");
            }
            None
        }))
    }

    fn deliver_receipt_effect(
        session: u64,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        receipt: Receipt,
    ) -> Effect<CheckoutAction> {
        let receipts = env.receipts.clone();
        async_effect! {
            let result = receipts.deliver(receipt).await.map_err(|e| e.to_string());
            Some(CheckoutAction::ReceiptDelivered { session, result })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════════════════

impl<B, C, G, P, R> CheckoutReducer<B, C, G, P, R>
where
    B: OrderApi + PaymentApi + Clone + 'static,
    C: CustomerSession,
    G: GatewayBridge + Clone + 'static,
    P: PendingOrderStore + Clone + 'static,
    R: ReceiptSink + Clone + 'static,
{
    fn methods_loaded(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        result: std::result::Result<Vec<PaymentMethod>, String>,
    ) -> Effects {
        state.methods_loading = false;

        match result {
            Ok(methods) => {
                state.available_methods = PaymentMethod::ALL
                    .into_iter()
                    .filter(|method| methods.contains(method))
                    .collect();

                let keep = state
                    .payment_method
                    .is_some_and(|method| state.available_methods.contains(&method));
                if !keep {
                    state.payment_method = state.available_methods.first().copied();
                }

                if state.available_methods.is_empty() {
                    return smallvec![notify(
                        state,
                        env,
                        NotificationLevel::Error,
                        TITLE_PAYMENT_ERROR,
                        "This shop has not enabled any payment methods.",
                    )];
                }
                smallvec![Effect::None]
            },
            Err(message) => {
                warn!(merchant_id = %state.merchant_id, %message, "Failed to load payment methods");
                smallvec![notify(state, env, NotificationLevel::Error, TITLE_PAYMENT_ERROR, message)]
            },
        }
    }

    fn submit_address(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
    ) -> Effects {
        if !StageTransition::SubmitAddress.permits(&state.stage, StageId::Payment) {
            debug!(stage = %state.stage.id(), "Ignoring address submit outside the address stage");
            return smallvec![Effect::None];
        }

        match state.address.validate() {
            Some(address) => {
                state.stage = CheckoutStage::Payment { address };
                if state.available_methods.is_empty() && !state.methods_loading {
                    state.methods_loading = true;
                    return smallvec![Self::load_methods_effect(state, env)];
                }
                smallvec![Effect::None]
            },
            None => {
                debug!(errors = state.address.errors().len(), "Address rejected");
                smallvec![Effect::None]
            },
        }
    }

    fn go_back(state: &mut CheckoutState, target: StageId) -> Effects {
        if state.processing {
            debug!(stage = %state.stage.id(), "Back navigation refused while an order is in flight");
            return smallvec![Effect::None];
        }

        match state.stage.go_back(target) {
            Ok(stage) => {
                if stage.id() < StageId::Confirmation {
                    state.pending_order = None;
                    state.payment_form = None;
                    state.processing = false;
                }
                state.stage = stage;
            },
            Err(e) => debug!(error = %e, "Back navigation refused"),
        }
        smallvec![Effect::None]
    }

    fn select_method(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        method: PaymentMethod,
    ) -> Effects {
        if state.available_methods.contains(&method) {
            state.payment_method = Some(method);
            return smallvec![Effect::None];
        }

        warn!(%method, merchant_id = %state.merchant_id, "Payment method not enabled");
        smallvec![notify(
            state,
            env,
            NotificationLevel::Error,
            TITLE_PAYMENT_ERROR,
            format!("{} is not available for this shop.", method.display_name()),
        )]
    }

    fn submit_payment(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
    ) -> Effects {
        let CheckoutStage::Payment { address } = &state.stage else {
            debug!(stage = %state.stage.id(), "Ignoring payment submit outside the payment stage");
            return smallvec![Effect::None];
        };
        let address = address.clone();
        if state.processing {
            debug!("Order submission already in progress");
            return smallvec![Effect::None];
        }

        if env.session.current_customer().is_none() {
            let message = StorefrontError::Unauthenticated.to_string();
            return smallvec![notify(
                state,
                env,
                NotificationLevel::Error,
                TITLE_AUTH_REQUIRED,
                message
            )];
        }

        let Some(method) = state.payment_method else {
            return smallvec![notify(
                state,
                env,
                NotificationLevel::Error,
                TITLE_PAYMENT_ERROR,
                "Please select a payment method.",
            )];
        };

        let draft = build_draft(state, &address, method);
        info!(
            merchant_id = %state.merchant_id,
            %method,
            total = %draft.total,
            "Placing order"
        );
        state.processing = true;
        smallvec![Self::create_order_effect(state.session, env, draft)]
    }

    fn order_created(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        result: std::result::Result<CreatedOrder, String>,
    ) -> Effects {
        let created = match result {
            Ok(created) => created,
            Err(message) => {
                warn!(%message, "Order creation failed");
                state.processing = false;
                return smallvec![notify(
                    state,
                    env,
                    NotificationLevel::Error,
                    TITLE_PROCESS_FAILED,
                    message
                )];
            },
        };

        let (CheckoutStage::Payment { address }, Some(method)) =
            (&state.stage, state.payment_method)
        else {
            warn!(order_id = %created.id, "Order created after leaving the payment stage");
            state.processing = false;
            return smallvec![Effect::None];
        };
        let address = address.clone();

        info!(order_id = %created.id, order_number = %created.order_number, "Order created");
        let order = build_order(state, &address, method, created, env.clock.now());

        if !method.is_online() {
            state.processing = false;
            let message = format!(
                "Your order {} has been placed successfully.",
                order.order_number
            );
            if StageTransition::PlaceOrder.permits(&state.stage, StageId::Confirmation) {
                state.stage = CheckoutStage::Confirmation { address, order };
            }
            return smallvec![notify(
                state,
                env,
                NotificationLevel::Success,
                "Order Placed Successfully!",
                message,
            )];
        }

        match payment_request(env, &order) {
            Ok(request) => {
                state.pending_order = Some(order.clone());
                smallvec![Self::initiate_payment_effect(state.session, env, order, request)]
            },
            Err(e) => {
                state.processing = false;
                smallvec![notify(
                    state,
                    env,
                    NotificationLevel::Error,
                    TITLE_PAYMENT_ERROR,
                    e.to_string()
                )]
            },
        }
    }

    fn payment_initiated(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        order_id: &OrderId,
        result: std::result::Result<PaymentForm, String>,
    ) -> Effects {
        if state
            .pending_order
            .as_ref()
            .is_none_or(|order| &order.order_id != order_id)
        {
            debug!(%order_id, "Ignoring payment form for a different order");
            return smallvec![Effect::None];
        }

        let form = match result {
            Ok(form) => form,
            Err(message) => {
                warn!(%order_id, %message, "Payment initiation failed");
                state.processing = false;
                return smallvec![notify(
                    state,
                    env,
                    NotificationLevel::Error,
                    TITLE_PAYMENT_ERROR,
                    message
                )];
            },
        };

        let post = match FormPost::from_payment_form(form) {
            Ok(post) => post,
            Err(e) => {
                warn!(%order_id, error = %e, "Gateway form incomplete");
                state.processing = false;
                return smallvec![notify(
                    state,
                    env,
                    NotificationLevel::Error,
                    TITLE_PAYMENT_ERROR,
                    "Unable to redirect to payment gateway. Missing required data.",
                )];
            },
        };

        if let Some(order) = state.pending_order.as_mut() {
            order.payment_status = PaymentStatus::Pending;
        }
        state.payment_form = Some(post.clone());
        info!(%order_id, url = %post.url, "Handing off to payment gateway");

        smallvec![
            notify(
                state,
                env,
                NotificationLevel::Info,
                "Redirecting to Payment Gateway",
                "Please wait while we redirect you to the secure payment page...",
            ),
            Self::submit_form_effect(state.session, env, post),
        ]
    }

    fn form_submitted(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        result: std::result::Result<(), String>,
    ) -> Effects {
        state.processing = false;
        match result {
            Ok(()) => smallvec![Effect::None],
            Err(message) => {
                warn!(%message, "Gateway submission failed");
                state.payment_form = None;
                smallvec![notify(
                    state,
                    env,
                    NotificationLevel::Error,
                    TITLE_PAYMENT_ERROR,
                    message
                )]
            },
        }
    }

    fn gateway_returned(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        gateway_return: GatewayReturn,
    ) -> Effects {
        let in_memory = state
            .pending_order
            .clone()
            .or_else(|| state.stage.order().cloned())
            .filter(|order| return_matches(&gateway_return, order));

        match in_memory {
            Some(order) => Self::resume(state, env, order, gateway_return),
            None => {
                debug!(order_id = ?gateway_return.order_id, "Loading persisted pending order");
                smallvec![Self::load_pending_effect(state.session, env, gateway_return)]
            },
        }
    }

    fn pending_loaded(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        gateway_return: GatewayReturn,
        result: std::result::Result<Option<OrderData>, String>,
    ) -> Effects {
        let message = match result {
            Ok(Some(order)) if return_matches(&gateway_return, &order) => {
                state.adopt_order(&order);
                return Self::resume(state, env, order, gateway_return);
            },
            Ok(_) => {
                warn!(order_id = ?gateway_return.order_id, "No pending order for gateway return");
                "We could not find the order for this payment. Please check your orders.".to_string()
            },
            Err(message) => {
                warn!(%message, "Failed to read pending order");
                message
            },
        };

        smallvec![
            notify(state, env, NotificationLevel::Error, "Order Not Found", message),
            Self::replace_location_effect(env, gateway_return.cleaned_url),
        ]
    }

    /// Enter Confirmation for `order` with the gateway's outcome hint.
    fn resume(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        mut order: OrderData,
        gateway_return: GatewayReturn,
    ) -> Effects {
        let cleanup = Self::replace_location_effect(env, gateway_return.cleaned_url.clone());

        if !StageTransition::ResumeFromGateway.permits(&state.stage, StageId::Confirmation) {
            debug!(order_id = %order.order_id, "Order already completed, ignoring gateway return");
            return smallvec![cleanup];
        }

        let address = match state.stage.address() {
            Some(address) => Some(address.clone()),
            None => {
                state.address = AddressForm::with_draft(order.shipping_address.clone());
                state.address.validate()
            },
        };
        let Some(address) = address else {
            warn!(order_id = %order.order_id, "Stored order has an invalid address");
            return smallvec![
                notify(
                    state,
                    env,
                    NotificationLevel::Error,
                    TITLE_PAYMENT_ERROR,
                    "The stored order is incomplete. Please check your orders.",
                ),
                cleanup,
            ];
        };

        if gateway_return.transaction_id.is_some() {
            order.transaction_id.clone_from(&gateway_return.transaction_id);
        }

        let order_id = order.order_id.clone();
        info!(%order_id, status = gateway_return.status.as_str(), "Customer returned from gateway");

        let (follow_up, notification) = match gateway_return.status {
            ReturnStatus::Success => {
                if !order.payment_status.is_final() {
                    order.payment_status = PaymentStatus::Pending;
                }
                (
                    Self::verify_effect(state.session, env, order_id),
                    (
                        NotificationLevel::Success,
                        "Payment Successful!",
                        "Your payment has been processed successfully. Your order is being confirmed.",
                    ),
                )
            },
            ReturnStatus::Failure => {
                order.payment_status = PaymentStatus::Failed;
                (
                    Self::clear_pending_effect(env),
                    (
                        NotificationLevel::Error,
                        TITLE_PAYMENT_FAILED,
                        "Your payment was not completed. You can go back and try again.",
                    ),
                )
            },
            ReturnStatus::Error => {
                order.payment_status = PaymentStatus::Failed;
                (
                    Self::clear_pending_effect(env),
                    (
                        NotificationLevel::Error,
                        TITLE_PAYMENT_FAILED,
                        "We could not process the payment response. You can go back and try again.",
                    ),
                )
            },
        };

        state.pending_order = None;
        state.payment_form = None;
        state.processing = false;
        state.stage = CheckoutStage::Confirmation { address, order };

        let (level, title, message) = notification;
        smallvec![
            notify(state, env, level, title, message),
            follow_up,
            cleanup,
        ]
    }

    fn payment_verified(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
        order_id: &OrderId,
        result: std::result::Result<PaymentStatus, String>,
    ) -> Effects {
        let Some(order) = state
            .stage
            .order_mut()
            .filter(|order| &order.order_id == order_id)
        else {
            debug!(%order_id, "Ignoring verification for an order no longer shown");
            return smallvec![Effect::None];
        };

        match result {
            Ok(status) => {
                info!(%order_id, ?status, "Payment verified by backend");
                order.payment_status = status;
                let order_number = order.order_number.clone();
                match status {
                    PaymentStatus::Completed => smallvec![
                        notify(
                            state,
                            env,
                            NotificationLevel::Success,
                            "Order Confirmed!",
                            format!("Payment for order {order_number} is confirmed."),
                        ),
                        Self::clear_pending_effect(env),
                    ],
                    PaymentStatus::Failed => smallvec![
                        notify(
                            state,
                            env,
                            NotificationLevel::Error,
                            TITLE_PAYMENT_FAILED,
                            "The payment could not be confirmed. You can go back and try again.",
                        ),
                        Self::clear_pending_effect(env),
                    ],
                    PaymentStatus::Initiated | PaymentStatus::Pending => smallvec![Effect::None],
                }
            },
            Err(message) => {
                warn!(%order_id, %message, "Payment verification failed");
                smallvec![Effect::None]
            },
        }
    }

    fn download_receipt(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, C, G, P, R>,
    ) -> Effects {
        match state.order() {
            Some(order) => {
                let receipt = Receipt::render(order);
                debug!(file_name = %receipt.file_name, "Rendering receipt");
                smallvec![Self::deliver_receipt_effect(state.session, env, receipt)]
            },
            None => {
                debug!("No confirmed order to print a receipt for");
                smallvec![Effect::None]
            },
        }
    }
}

impl<B, C, G, P, R> Reducer for CheckoutReducer<B, C, G, P, R>
where
    B: OrderApi + PaymentApi + Clone + 'static,
    C: CustomerSession,
    G: GatewayBridge + Clone + 'static,
    P: PendingOrderStore + Clone + 'static,
    R: ReceiptSink + Clone + 'static,
{
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment<B, C, G, P, R>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if let Some(session) = action.session().filter(|&s| s != state.session) {
            debug!(session, current = state.session, "Ignoring result of a previous checkout");
            return smallvec![Effect::None];
        }

        match action {
            // ═══════════════════════════════════════════════════════════
            // Commands
            // ═══════════════════════════════════════════════════════════
            CheckoutAction::LoadPaymentMethods => {
                state.methods_loading = true;
                smallvec![Self::load_methods_effect(state, env)]
            },

            CheckoutAction::EditAddress { field, value } => {
                if state.stage.id() == StageId::Address {
                    state.address.set(field, value);
                }
                smallvec![Effect::None]
            },

            CheckoutAction::SubmitAddress => Self::submit_address(state, env),

            CheckoutAction::GoBack => match state.stage.id() {
                StageId::Address => smallvec![Effect::None],
                StageId::Payment => Self::go_back(state, StageId::Address),
                StageId::Confirmation => Self::go_back(state, StageId::Payment),
            },

            CheckoutAction::GoToStage { stage } => Self::go_back(state, stage),

            CheckoutAction::SelectPaymentMethod { method } => {
                Self::select_method(state, env, method)
            },

            CheckoutAction::SubmitPayment => Self::submit_payment(state, env),

            CheckoutAction::GatewayReturned { gateway_return } => {
                Self::gateway_returned(state, env, gateway_return)
            },

            CheckoutAction::DownloadReceipt => Self::download_receipt(state, env),

            CheckoutAction::Continue => {
                if state.stage.id() != StageId::Confirmation {
                    return smallvec![Effect::None];
                }
                state.finished = true;
                smallvec![Self::clear_pending_effect(env)]
            },

            CheckoutAction::DismissNotification { id } => {
                state.notifications.retain(|n| n.id != id);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Results
            // ═══════════════════════════════════════════════════════════
            CheckoutAction::NotificationExpired { session, id } => {
                if session == state.session {
                    state.notifications.retain(|n| n.id != id);
                }
                smallvec![Effect::None]
            },

            CheckoutAction::PaymentMethodsLoaded { result, .. } => {
                Self::methods_loaded(state, env, result)
            },

            CheckoutAction::OrderCreated { result, .. } => Self::order_created(state, env, result),

            CheckoutAction::PaymentInitiated {
                order_id, result, ..
            } => Self::payment_initiated(state, env, &order_id, result),

            CheckoutAction::PaymentFormSubmitted { result, .. } => {
                Self::form_submitted(state, env, result)
            },

            CheckoutAction::PendingOrderLoaded {
                gateway_return,
                result,
                ..
            } => Self::pending_loaded(state, env, gateway_return, result),

            CheckoutAction::PaymentVerified {
                order_id, result, ..
            } => Self::payment_verified(state, env, &order_id, result),

            CheckoutAction::ReceiptDelivered { result, .. } => match result {
                Ok(()) => smallvec![Effect::None],
                Err(message) => {
                    warn!(%message, "Receipt delivery failed");
                    smallvec![notify(
                        state,
                        env,
                        NotificationLevel::Error,
                        "Receipt Failed",
                        message
                    )]
                },
            },
        }
    }
}
