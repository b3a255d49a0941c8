//! Storefront composition root.
//!
//! [`StorefrontReducer`] embeds the cart, wishlist and checkout reducers.
//! Each child runs on its own slice of [`StorefrontState`] and its effects
//! are lifted into [`StorefrontAction`] with [`Effect::map`]. The only
//! cross-feature traffic goes through here: starting a checkout snapshots
//! the cart, and finishing one clears it.

use crate::cart::{CartAction, CartEnvironment, CartReducer, CartState, checkout_items};
use crate::checkout::{
    CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState, StageId,
};
use crate::config::StorefrontConfig;
use crate::gateway::GatewayReturn;
use crate::providers::{
    CartApi, CustomerSession, GatewayBridge, OrderApi, PaymentApi, PendingOrderStore, ReceiptSink,
    WishlistApi,
};
use crate::types::MerchantId;
use crate::wishlist::{WishlistAction, WishlistEnvironment, WishlistReducer, WishlistState};
use doko_core::effect::Effect;
use doko_core::environment::Clock;
use doko_core::reducer::Reducer;
use doko_core::{SmallVec, smallvec};
use std::sync::Arc;
use tracing::{debug, info, warn};

type Effects = SmallVec<[Effect<StorefrontAction>; 4]>;

/// Whole-storefront state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorefrontState {
    /// Cart lines and flags.
    pub cart: CartState,
    /// Saved products.
    pub wishlist: WishlistState,
    /// The open checkout, if any.
    pub checkout: Option<CheckoutState>,
    last_session: u64,
}

impl StorefrontState {
    fn next_session(&mut self) -> u64 {
        self.last_session += 1;
        self.last_session
    }
}

/// Whole-storefront actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorefrontAction {
    /// Fetch the cart and the wishlist.
    Load,
    /// A cart action.
    Cart(CartAction),
    /// A wishlist action.
    Wishlist(WishlistAction),
    /// An action for the open checkout.
    Checkout(CheckoutAction),
    /// Start checking out one merchant's cart lines.
    BeginCheckout {
        /// Merchant whose lines are checked out.
        merchant_id: MerchantId,
    },
    /// Leave the checkout without finishing it.
    CloseCheckout,
    /// The page was loaded at `url`, possibly a gateway return.
    PageLoaded {
        /// Full page URL.
        url: String,
    },
}

/// Dependencies of [`StorefrontReducer`], one per feature.
#[derive(Clone)]
pub struct StorefrontEnvironment<B, C, G, P, R> {
    /// Cart dependencies.
    pub cart: CartEnvironment<B>,
    /// Wishlist dependencies.
    pub wishlist: WishlistEnvironment<B>,
    /// Checkout dependencies.
    pub checkout: CheckoutEnvironment<B, C, G, P, R>,
}

impl<B: Clone, C, G, P, R> StorefrontEnvironment<B, C, G, P, R> {
    /// Wire every feature to the same backend.
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
            cart: CartEnvironment::new(api.clone()),
            wishlist: WishlistEnvironment::new(api.clone()),
            checkout: CheckoutEnvironment::new(
                api,
                session,
                gateway,
                pending_orders,
                receipts,
                clock,
                config,
            ),
        }
    }
}

/// Reducer for [`StorefrontState`].
#[derive(Debug)]
pub struct StorefrontReducer<B, C, G, P, R> {
    cart: CartReducer<B>,
    wishlist: WishlistReducer<B>,
    checkout: CheckoutReducer<B, C, G, P, R>,
}

impl<B, C, G, P, R> StorefrontReducer<B, C, G, P, R> {
    /// Create the storefront reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cart: CartReducer::new(),
            wishlist: WishlistReducer::new(),
            checkout: CheckoutReducer::new(),
        }
    }
}

impl<B, C, G, P, R> Default for StorefrontReducer<B, C, G, P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, C, G, P, R> Clone for StorefrontReducer<B, C, G, P, R> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

fn lift<A, F>(effects: SmallVec<[Effect<A>; 4]>, f: F) -> Effects
where
    A: Send + 'static,
    F: Fn(A) -> StorefrontAction + Clone + Send + Sync + 'static,
{
    effects.into_iter().map(|effect| effect.map(f.clone())).collect()
}

impl<B, C, G, P, R> StorefrontReducer<B, C, G, P, R>
where
    B: CartApi + WishlistApi + OrderApi + PaymentApi + Clone + 'static,
    C: CustomerSession,
    G: GatewayBridge + Clone + 'static,
    P: PendingOrderStore + Clone + 'static,
    R: ReceiptSink + Clone + 'static,
{
    fn reduce_cart(
        &self,
        state: &mut StorefrontState,
        action: CartAction,
        env: &StorefrontEnvironment<B, C, G, P, R>,
    ) -> Effects {
        lift(
            self.cart.reduce(&mut state.cart, action, &env.cart),
            StorefrontAction::Cart,
        )
    }

    fn reduce_checkout(
        &self,
        state: &mut StorefrontState,
        action: CheckoutAction,
        env: &StorefrontEnvironment<B, C, G, P, R>,
    ) -> Effects {
        let Some(checkout) = state.checkout.as_mut() else {
            debug!(?action, "No open checkout");
            return smallvec![Effect::None];
        };

        if action == CheckoutAction::GoBack && checkout.stage.id() == StageId::Address {
            debug!(session = checkout.session, "Leaving checkout from the address stage");
            state.checkout = None;
            return smallvec![Effect::None];
        }

        let mut effects = lift(
            self.checkout.reduce(checkout, action, &env.checkout),
            StorefrontAction::Checkout,
        );

        if checkout.finished {
            info!(session = checkout.session, "Checkout finished, clearing cart");
            state.checkout = None;
            effects.extend(self.reduce_cart(state, CartAction::ClearAll, env));
        }
        effects
    }

    fn begin_checkout(
        &self,
        state: &mut StorefrontState,
        merchant_id: MerchantId,
        env: &StorefrontEnvironment<B, C, G, P, R>,
    ) -> Effects {
        let items = checkout_items(&state.cart, &merchant_id);
        if items.is_empty() {
            warn!(%merchant_id, "No cart lines for merchant, not starting checkout");
            return smallvec![Effect::None];
        }

        let session = state.next_session();
        let email = env
            .checkout
            .session
            .current_customer()
            .map(|customer| customer.email)
            .unwrap_or_default();
        info!(session, %merchant_id, lines = items.len(), "Starting checkout");

        state.checkout = Some(CheckoutState::new(
            session,
            merchant_id,
            items,
            email,
            env.checkout.config.default_country.clone(),
        ));
        self.reduce_checkout(state, CheckoutAction::LoadPaymentMethods, env)
    }

    fn page_loaded(
        &self,
        state: &mut StorefrontState,
        url: &str,
        env: &StorefrontEnvironment<B, C, G, P, R>,
    ) -> Effects {
        let gateway_return = match GatewayReturn::parse(url) {
            Ok(Some(gateway_return)) => gateway_return,
            Ok(None) => return smallvec![Effect::None],
            Err(e) => {
                warn!(%url, error = %e, "Ignoring malformed gateway return");
                return smallvec![Effect::None];
            },
        };

        if state.checkout.is_none() {
            // The page was reloaded by the gateway redirect: resume in a new
            // session that adopts the persisted order.
            let session = state.next_session();
            state.checkout = Some(CheckoutState::resuming(
                session,
                env.checkout.config.default_country.clone(),
            ));
        }
        self.reduce_checkout(
            state,
            CheckoutAction::GatewayReturned { gateway_return },
            env,
        )
    }
}

impl<B, C, G, P, R> Reducer for StorefrontReducer<B, C, G, P, R>
where
    B: CartApi + WishlistApi + OrderApi + PaymentApi + Clone + 'static,
    C: CustomerSession,
    G: GatewayBridge + Clone + 'static,
    P: PendingOrderStore + Clone + 'static,
    R: ReceiptSink + Clone + 'static,
{
    type State = StorefrontState;
    type Action = StorefrontAction;
    type Environment = StorefrontEnvironment<B, C, G, P, R>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            StorefrontAction::Load => {
                let mut effects = self.reduce_cart(state, CartAction::FetchItems, env);
                effects.extend(lift(
                    self.wishlist
                        .reduce(&mut state.wishlist, WishlistAction::FetchItems, &env.wishlist),
                    StorefrontAction::Wishlist,
                ));
                effects
            },

            StorefrontAction::Cart(action) => self.reduce_cart(state, action, env),

            StorefrontAction::Wishlist(action) => lift(
                self.wishlist.reduce(&mut state.wishlist, action, &env.wishlist),
                StorefrontAction::Wishlist,
            ),

            StorefrontAction::Checkout(action) => self.reduce_checkout(state, action, env),

            StorefrontAction::BeginCheckout { merchant_id } => {
                self.begin_checkout(state, merchant_id, env)
            },

            StorefrontAction::CloseCheckout => {
                state.checkout = None;
                smallvec![Effect::None]
            },

            StorefrontAction::PageLoaded { url } => self.page_loaded(state, &url, env),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)] // Tests are allowed to panic on failures
mod tests {
    use super::*;
    use crate::checkout::{AddressField, CheckoutStage};
    use crate::mocks::{
        InMemoryPendingOrders, MockBackend, MockCustomerSession, RecordingGateway,
        RecordingReceiptSink,
    };
    use crate::types::CartLineItem;
    use doko_testing::{assertions, mocks::test_clock};
    use rust_decimal_macros::dec;

    type TestReducer = StorefrontReducer<
        MockBackend,
        MockCustomerSession,
        RecordingGateway,
        InMemoryPendingOrders,
        RecordingReceiptSink,
    >;
    type TestEnv = StorefrontEnvironment<
        MockBackend,
        MockCustomerSession,
        RecordingGateway,
        InMemoryPendingOrders,
        RecordingReceiptSink,
    >;

    fn env() -> TestEnv {
        StorefrontEnvironment::new(
            MockBackend::new(),
            MockCustomerSession::signed_in("gita@example.com"),
            RecordingGateway::new(),
            InMemoryPendingOrders::new(),
            RecordingReceiptSink::new(),
            Arc::new(test_clock()),
            StorefrontConfig::default().with_notification_ttl(None),
        )
    }

    fn line(id: &str, merchant: &str) -> CartLineItem {
        CartLineItem::new(id.into(), format!("p-{id}").as_str().into(), id, dec!(250), 1)
            .with_merchant(MerchantId::new(merchant), format!("{merchant} shop"))
    }

    fn two_merchant_cart() -> StorefrontState {
        StorefrontState {
            cart: CartState::with_lines(vec![line("a", "m-1"), line("b", "m-2"), line("c", "m-1")]),
            ..StorefrontState::default()
        }
    }

    fn send(state: &mut StorefrontState, action: StorefrontAction) -> Effects {
        TestReducer::new().reduce(state, action, &env())
    }

    #[test]
    fn begin_checkout_snapshots_merchant_lines() {
        let mut state = two_merchant_cart();
        let effects = send(
            &mut state,
            StorefrontAction::BeginCheckout {
                merchant_id: MerchantId::new("m-1"),
            },
        );

        assertions::assert_has_future_effect(&effects);
        let Some(checkout) = &state.checkout else {
            panic!("checkout should be open");
        };
        assert_eq!(checkout.items.len(), 2);
        assert_eq!(checkout.totals.total, dec!(500));
        assert_eq!(checkout.address.draft().email, "gita@example.com");
        assert_eq!(checkout.address.draft().country, "Nepal");
        assert!(checkout.methods_loading);
    }

    #[test]
    fn switching_merchant_starts_fresh_session() {
        let mut state = two_merchant_cart();
        let _ = send(
            &mut state,
            StorefrontAction::BeginCheckout {
                merchant_id: MerchantId::new("m-1"),
            },
        );
        let _ = send(
            &mut state,
            StorefrontAction::Checkout(CheckoutAction::EditAddress {
                field: AddressField::Name,
                value: "Gita".to_string(),
            }),
        );

        let _ = send(
            &mut state,
            StorefrontAction::BeginCheckout {
                merchant_id: MerchantId::new("m-2"),
            },
        );

        let Some(checkout) = &state.checkout else {
            panic!("checkout should be open");
        };
        assert_eq!(checkout.session, 2);
        assert_eq!(checkout.merchant_id, MerchantId::new("m-2"));
        assert_eq!(checkout.stage, CheckoutStage::Address);
        assert_eq!(checkout.address.draft().name, "");
        assert_eq!(checkout.items.len(), 1);
        assert!(checkout.order().is_none());
        assert!(checkout.payment_method.is_none());
    }

    #[test]
    fn back_from_address_closes_checkout() {
        let mut state = two_merchant_cart();
        let _ = send(
            &mut state,
            StorefrontAction::BeginCheckout {
                merchant_id: MerchantId::new("m-1"),
            },
        );
        let _ = send(&mut state, StorefrontAction::Checkout(CheckoutAction::GoBack));
        assert!(state.checkout.is_none());
        assert_eq!(state.cart.lines().len(), 3);
    }

    #[test]
    fn empty_merchant_does_not_open_checkout() {
        let mut state = two_merchant_cart();
        let effects = send(
            &mut state,
            StorefrontAction::BeginCheckout {
                merchant_id: MerchantId::new("m-9"),
            },
        );
        assertions::assert_no_effects(&effects);
        assert!(state.checkout.is_none());
    }

    #[test]
    fn plain_page_load_is_ignored() {
        let mut state = StorefrontState::default();
        let effects = send(
            &mut state,
            StorefrontAction::PageLoaded {
                url: "http://localhost:2025/customerView?tab=cart".to_string(),
            },
        );
        assertions::assert_no_effects(&effects);
        assert!(state.checkout.is_none());
    }

    #[test]
    fn gateway_return_after_reload_opens_resume_session() {
        let mut state = StorefrontState::default();
        let effects = send(
            &mut state,
            StorefrontAction::PageLoaded {
                url: "http://localhost:2025/customerView?paymentStatus=success&orderId=order-1"
                    .to_string(),
            },
        );

        assertions::assert_has_future_effect(&effects);
        let Some(checkout) = &state.checkout else {
            panic!("resume session should be open");
        };
        assert_eq!(checkout.session, 1);
    }
}
