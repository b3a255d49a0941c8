//! Integration tests for the checkout flow running in a `Store`
//!
//! The storefront reducer is driven end to end against the in-memory
//! backend: cash on delivery, an eSewa hand-off, a gateway return after a
//! page reload, and a merchant switch while an order request is in flight.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use doko_runtime::Store;
use doko_storefront::checkout::{AddressField, StageId};
use doko_storefront::mocks::{
    InMemoryPendingOrders, MockBackend, MockCustomerSession, RecordingGateway,
    RecordingReceiptSink, backend::ESEWA_FORM_URL,
};
use doko_storefront::types::{CartLineItem, MerchantId, OrderId, PaymentMethod, PaymentStatus};
use doko_storefront::{
    CheckoutAction, StorefrontAction, StorefrontConfig, StorefrontEnvironment, StorefrontReducer,
    StorefrontState, SubmissionMode,
};
use doko_testing::{init_test_tracing, test_clock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

type TestEnv = StorefrontEnvironment<
    MockBackend,
    MockCustomerSession,
    RecordingGateway,
    InMemoryPendingOrders,
    RecordingReceiptSink,
>;
type TestReducer = StorefrontReducer<
    MockBackend,
    MockCustomerSession,
    RecordingGateway,
    InMemoryPendingOrders,
    RecordingReceiptSink,
>;
type TestStore = Store<StorefrontState, StorefrontAction, TestEnv, TestReducer>;

const KITCHEN: &str = "m-kitchen";
const BOOKS: &str = "m-books";
const RETURN_PAGE: &str = "http://localhost:2025/customerView";

struct Harness {
    backend: MockBackend,
    gateway: RecordingGateway,
    pending_orders: InMemoryPendingOrders,
    receipts: RecordingReceiptSink,
}

impl Harness {
    fn new(backend: MockBackend) -> Self {
        init_test_tracing();
        Self {
            backend,
            gateway: RecordingGateway::new(),
            pending_orders: InMemoryPendingOrders::new(),
            receipts: RecordingReceiptSink::new(),
        }
    }

    /// A fresh store over the shared mocks, as after a page load.
    fn store(&self) -> TestStore {
        let env = StorefrontEnvironment::new(
            self.backend.clone(),
            MockCustomerSession::signed_in("asha@example.com"),
            self.gateway.clone(),
            self.pending_orders.clone(),
            self.receipts.clone(),
            Arc::new(test_clock()),
            StorefrontConfig::default().with_notification_ttl(None),
        );
        Store::new(StorefrontState::default(), TestReducer::new(), env)
    }
}

fn line(id: &str, product: &str, price: Decimal, quantity: u32, merchant: &str) -> CartLineItem {
    CartLineItem::new(id.into(), product.into(), product, price, quantity)
        .with_merchant(MerchantId::new(merchant), format!("{merchant} shop"))
        .with_stock(10)
}

/// Kitchen lines total 1100; one book line from another merchant.
fn seeded_backend() -> MockBackend {
    MockBackend::new()
        .with_cart_line(line("ci-momo", "p-momo", dec!(500), 2, KITCHEN))
        .with_cart_line(line("ci-tea", "p-tea", dec!(100), 1, KITCHEN))
        .with_cart_line(line("ci-book", "p-book", dec!(900), 1, BOOKS))
}

async fn settle(store: &TestStore, action: StorefrontAction) {
    let mut handle = store.send(action).await.unwrap();
    handle
        .wait_with_timeout(Duration::from_secs(5))
        .await
        .unwrap();
}

async fn checkout(store: &TestStore, action: CheckoutAction) {
    settle(store, StorefrontAction::Checkout(action)).await;
}

/// Load the cart, open the kitchen checkout and reach the payment stage.
async fn reach_payment(store: &TestStore) {
    settle(store, StorefrontAction::Load).await;
    settle(
        store,
        StorefrontAction::BeginCheckout {
            merchant_id: MerchantId::new(KITCHEN),
        },
    )
    .await;

    for (field, value) in [
        (AddressField::Name, "Asha Gurung"),
        (AddressField::Mobile, "9812345678"),
        (AddressField::Address, "Lakeside Road 12"),
        (AddressField::City, "Pokhara"),
    ] {
        checkout(
            store,
            CheckoutAction::EditAddress {
                field,
                value: value.to_string(),
            },
        )
        .await;
    }
    checkout(store, CheckoutAction::SubmitAddress).await;

    let stage = store
        .state(|s| s.checkout.as_ref().map(|c| c.stage.id()))
        .await;
    assert_eq!(stage, Some(StageId::Payment));
}

async fn pay_with_esewa(store: &TestStore) {
    reach_payment(store).await;
    checkout(
        store,
        CheckoutAction::SelectPaymentMethod {
            method: PaymentMethod::Esewa,
        },
    )
    .await;
    checkout(store, CheckoutAction::SubmitPayment).await;
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn cash_on_delivery_confirms_order() {
    let harness = Harness::new(seeded_backend());
    let store = harness.store();

    reach_payment(&store).await;
    checkout(
        &store,
        CheckoutAction::SelectPaymentMethod {
            method: PaymentMethod::Cod,
        },
    )
    .await;
    checkout(&store, CheckoutAction::SubmitPayment).await;

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.stage.id(), StageId::Confirmation);
    assert!(!checkout_state.processing);

    let order = checkout_state.order().unwrap();
    assert_eq!(order.total, dec!(1100));
    assert_eq!(order.order_number, "ORD-1001");
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.items.len(), 2);
    assert!(
        checkout_state
            .notifications
            .iter()
            .any(|n| n.title == "Order Placed Successfully!")
    );

    let drafts = harness.backend.created_orders();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].merchant_id, MerchantId::new(KITCHEN));
    assert_eq!(drafts[0].total, dec!(1100));
    assert_eq!(drafts[0].shipping_address.email, "asha@example.com");
    assert!(harness.backend.initiated_payments().is_empty());
    assert!(harness.gateway.submissions().is_empty());
}

#[tokio::test]
async fn receipt_is_delivered_for_confirmed_order() {
    let harness = Harness::new(seeded_backend());
    let store = harness.store();

    reach_payment(&store).await;
    checkout(&store, CheckoutAction::SubmitPayment).await;
    checkout(&store, CheckoutAction::DownloadReceipt).await;

    let receipts = harness.receipts.receipts();
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].body.contains("ORD-1001"));
    assert!(receipts[0].body.contains("Asha Gurung"));
}

#[tokio::test]
async fn continue_after_confirmation_clears_cart() {
    let harness = Harness::new(seeded_backend());
    let store = harness.store();

    reach_payment(&store).await;
    checkout(&store, CheckoutAction::SubmitPayment).await;
    checkout(&store, CheckoutAction::Continue).await;

    let (open, empty) = store
        .state(|s| (s.checkout.is_some(), s.cart.is_empty()))
        .await;
    assert!(!open);
    assert!(empty);
    assert!(harness.backend.cart_lines().is_empty());
}

#[tokio::test]
async fn esewa_payment_hands_form_to_gateway() {
    let harness = Harness::new(seeded_backend());
    let store = harness.store();

    pay_with_esewa(&store).await;

    let requests = harness.backend.initiated_payments();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount_minor, 110_000);
    assert_eq!(requests[0].payment_method, PaymentMethod::Esewa);
    assert_eq!(
        requests[0].return_url,
        format!("{RETURN_PAGE}?paymentStatus=success&orderId=order-1")
    );
    assert_eq!(
        requests[0].failure_url,
        format!("{RETURN_PAGE}?paymentStatus=failure&orderId=order-1")
    );

    let submissions = harness.gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0.url, ESEWA_FORM_URL);
    assert_eq!(submissions[0].1, SubmissionMode::Redirect);
    assert_eq!(
        submissions[0].0.fields.get("amount").map(String::as_str),
        Some("110000")
    );

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.stage.id(), StageId::Payment);
    assert!(!checkout_state.processing);
    let pending = checkout_state.pending_order.unwrap();
    assert_eq!(pending.order_id, OrderId::new("order-1"));
    assert_eq!(pending.payment_status, PaymentStatus::Pending);
    assert!(!harness.pending_orders.is_empty());
}

#[tokio::test]
async fn gateway_return_after_reload_resumes_and_verifies() {
    let harness = Harness::new(seeded_backend());
    pay_with_esewa(&harness.store()).await;
    harness
        .backend
        .set_payment_status(&OrderId::new("order-1"), PaymentStatus::Completed);

    // The gateway redirect reloads the page: all in-memory state is gone.
    let store = harness.store();
    settle(
        &store,
        StorefrontAction::PageLoaded {
            url: format!("{RETURN_PAGE}?paymentStatus=success&orderId=order-1&transactionId=TX-77"),
        },
    )
    .await;

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.stage.id(), StageId::Confirmation);
    assert_eq!(checkout_state.merchant_id, MerchantId::new(KITCHEN));
    assert_eq!(checkout_state.totals.total, dec!(1100));

    let order = checkout_state.order().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.transaction_id.as_deref(), Some("TX-77"));
    assert_eq!(order.shipping_address.city, "Pokhara");

    let titles: Vec<&str> = checkout_state
        .notifications
        .iter()
        .map(|n| n.title.as_str())
        .collect();
    assert!(titles.contains(&"Payment Successful!"));
    assert!(titles.contains(&"Order Confirmed!"));

    assert!(harness.pending_orders.is_empty());
    let locations = harness.gateway.locations();
    assert_eq!(locations.last().map(|url| url.as_str()), Some(RETURN_PAGE));
}

#[tokio::test]
async fn failed_gateway_return_allows_retry() {
    let harness = Harness::new(seeded_backend());
    let store = harness.store();
    pay_with_esewa(&store).await;

    settle(
        &store,
        StorefrontAction::PageLoaded {
            url: format!("{RETURN_PAGE}?paymentStatus=failure&orderId=order-1"),
        },
    )
    .await;

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.stage.id(), StageId::Confirmation);
    assert_eq!(
        checkout_state.order().map(|o| o.payment_status),
        Some(PaymentStatus::Failed)
    );
    assert!(
        checkout_state
            .notifications
            .iter()
            .any(|n| n.title == "Payment Failed")
    );
    assert!(harness.pending_orders.is_empty());

    checkout(&store, CheckoutAction::GoBack).await;
    let stage = store
        .state(|s| s.checkout.as_ref().map(|c| c.stage.id()))
        .await;
    assert_eq!(stage, Some(StageId::Payment));
}

#[tokio::test]
async fn unknown_order_on_return_is_reported() {
    let harness = Harness::new(seeded_backend());
    let store = harness.store();

    settle(
        &store,
        StorefrontAction::PageLoaded {
            url: format!("{RETURN_PAGE}?paymentStatus=success&orderId=order-404&tab=orders"),
        },
    )
    .await;

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_ne!(checkout_state.stage.id(), StageId::Confirmation);
    assert!(
        checkout_state
            .notifications
            .iter()
            .any(|n| n.title == "Order Not Found")
    );
    let locations = harness.gateway.locations();
    assert_eq!(
        locations.last().map(|url| url.as_str()),
        Some("http://localhost:2025/customerView?tab=orders")
    );
}

#[tokio::test]
async fn switching_merchant_drops_in_flight_order() {
    let harness = Harness::new(seeded_backend().with_latency(Duration::from_millis(30)));
    let store = harness.store();
    reach_payment(&store).await;

    let mut order_request = store
        .send(StorefrontAction::Checkout(CheckoutAction::SubmitPayment))
        .await
        .unwrap();
    settle(
        &store,
        StorefrontAction::BeginCheckout {
            merchant_id: MerchantId::new(BOOKS),
        },
    )
    .await;
    order_request
        .wait_with_timeout(Duration::from_secs(5))
        .await
        .unwrap();

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.merchant_id, MerchantId::new(BOOKS));
    assert_eq!(checkout_state.stage.id(), StageId::Address);
    assert_eq!(checkout_state.totals.total, dec!(900));
    assert!(checkout_state.order().is_none());
    assert!(!checkout_state.processing);
    assert!(checkout_state.notifications.is_empty());
    assert_eq!(checkout_state.address.draft().name, "");

    // The request still reached the backend; only its result was dropped.
    assert_eq!(harness.backend.created_orders().len(), 1);
}

#[tokio::test]
async fn going_back_while_order_is_placed_does_not_resubmit() {
    let harness = Harness::new(seeded_backend().with_latency(Duration::from_millis(30)));
    let store = harness.store();
    reach_payment(&store).await;

    let mut order_request = store
        .send(StorefrontAction::Checkout(CheckoutAction::SubmitPayment))
        .await
        .unwrap();
    checkout(&store, CheckoutAction::GoBack).await;
    checkout(&store, CheckoutAction::SubmitAddress).await;
    checkout(&store, CheckoutAction::SubmitPayment).await;
    order_request
        .wait_with_timeout(Duration::from_secs(5))
        .await
        .unwrap();

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.stage.id(), StageId::Confirmation);
    assert!(!checkout_state.processing);
    assert_eq!(
        checkout_state.order().map(|o| o.order_number.as_str()),
        Some("ORD-1001")
    );
    assert_eq!(harness.backend.created_orders().len(), 1);
}

#[tokio::test]
async fn going_back_during_gateway_hand_off_does_not_resubmit() {
    let harness = Harness::new(seeded_backend().with_latency(Duration::from_millis(30)));
    let store = harness.store();
    reach_payment(&store).await;
    checkout(
        &store,
        CheckoutAction::SelectPaymentMethod {
            method: PaymentMethod::Esewa,
        },
    )
    .await;

    let mut order_request = store
        .send(StorefrontAction::Checkout(CheckoutAction::SubmitPayment))
        .await
        .unwrap();
    checkout(&store, CheckoutAction::GoBack).await;
    checkout(&store, CheckoutAction::SubmitPayment).await;
    order_request
        .wait_with_timeout(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(harness.backend.created_orders().len(), 1);
    assert_eq!(harness.backend.initiated_payments().len(), 1);
    assert_eq!(harness.gateway.submissions().len(), 1);

    let checkout_state = store.state(|s| s.checkout.clone()).await.unwrap();
    assert_eq!(checkout_state.stage.id(), StageId::Payment);
    assert!(!checkout_state.processing);
}
