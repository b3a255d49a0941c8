//! Integration tests for optimistic cart and wishlist updates
//!
//! Actions are sent back to back while the in-memory backend is slow, so
//! later edits arrive while earlier requests are still in flight.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use doko_runtime::{EffectHandle, Store};
use doko_storefront::mocks::{
    CatalogProduct, InMemoryPendingOrders, MockBackend, MockCustomerSession, Operation,
    RecordingGateway, RecordingReceiptSink,
};
use doko_storefront::types::{CartItemId, CartLineItem, MerchantId, ProductId};
use doko_storefront::{
    CartAction, StorefrontAction, StorefrontConfig, StorefrontEnvironment, StorefrontError,
    StorefrontReducer, StorefrontState, WishlistAction,
};
use doko_testing::test_clock;
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

const LATENCY: Duration = Duration::from_millis(25);
const TIMEOUT: Duration = Duration::from_secs(5);

fn backend() -> MockBackend {
    MockBackend::new()
        .with_latency(LATENCY)
        .with_product(CatalogProduct::new("p-shawl", "Pashmina Shawl", dec!(2500), "m-1", 4))
        .with_product(CatalogProduct::new("p-tea", "Ilam Tea", dec!(100), "m-1", 20))
        .with_cart_line(
            CartLineItem::new("ci-1".into(), "p-tea".into(), "Ilam Tea", dec!(100), 1)
                .with_merchant(MerchantId::new("m-1"), "Ilam Traders")
                .with_stock(20),
        )
}

async fn loaded_store(backend: &MockBackend) -> TestStore {
    let env = StorefrontEnvironment::new(
        backend.clone(),
        MockCustomerSession::signed_in("binod@example.com"),
        RecordingGateway::new(),
        InMemoryPendingOrders::new(),
        RecordingReceiptSink::new(),
        Arc::new(test_clock()),
        StorefrontConfig::default().with_notification_ttl(None),
    );
    let store = Store::new(StorefrontState::default(), TestReducer::new(), env);
    settle(vec![store.send(StorefrontAction::Load).await.unwrap()]).await;
    store
}

async fn settle(handles: Vec<EffectHandle>) {
    for mut handle in handles {
        handle.wait_with_timeout(TIMEOUT).await.unwrap();
    }
}

fn update(quantity: i64) -> StorefrontAction {
    StorefrontAction::Cart(CartAction::UpdateItem {
        cart_item_id: CartItemId::new("ci-1"),
        quantity,
    })
}

fn toggle(product: &str) -> StorefrontAction {
    StorefrontAction::Wishlist(WishlistAction::Toggle {
        product_id: ProductId::new(product),
    })
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
async fn rapid_quantity_edits_converge_on_last_value() {
    let backend = backend();
    let store = loaded_store(&backend).await;

    let mut handles = Vec::new();
    for quantity in [3, 4, 5] {
        handles.push(store.send(update(quantity)).await.unwrap());
    }
    let shown = store
        .state(|s| s.cart.line(&CartItemId::new("ci-1")).map(CartLineItem::quantity))
        .await;
    assert_eq!(shown, Some(5));

    settle(handles).await;

    let (quantity, summary, pending) = store
        .state(|s| {
            (
                s.cart.line(&CartItemId::new("ci-1")).map(CartLineItem::quantity),
                s.cart.summary().clone(),
                s.cart.has_pending_requests(),
            )
        })
        .await;
    assert_eq!(quantity, Some(5));
    assert_eq!(summary.total_items, 5);
    assert_eq!(summary.total_amount, dec!(500));
    assert!(!pending);

    let id = CartItemId::new("ci-1");
    assert_eq!(backend.cart_lines()[0].quantity(), 5);
    assert_eq!(backend.max_concurrent_updates(&id), 1);
    assert_eq!(backend.update_calls(), vec![(id.clone(), 3), (id, 5)]);
}

#[tokio::test]
async fn zero_or_negative_quantity_removes_line() {
    for quantity in [0, -1] {
        let backend = backend();
        let store = loaded_store(&backend).await;

        let handle = store.send(update(quantity)).await.unwrap();
        assert!(store.state(|s| s.cart.is_empty()).await);
        settle(vec![handle]).await;

        assert!(store.state(|s| s.cart.is_empty()).await);
        assert!(backend.cart_lines().is_empty());
        assert!(backend.update_calls().is_empty());
    }
}

#[tokio::test]
async fn rejected_update_rolls_back() {
    let backend = backend();
    let store = loaded_store(&backend).await;
    backend.fail_next(
        Operation::UpdateItem,
        StorefrontError::Api {
            status: 409,
            message: "Cart item is locked".to_string(),
        },
    );

    settle(vec![store.send(update(7)).await.unwrap()]).await;

    let (quantity, error) = store
        .state(|s| {
            (
                s.cart.line(&CartItemId::new("ci-1")).map(CartLineItem::quantity),
                s.cart.error.clone(),
            )
        })
        .await;
    assert_eq!(quantity, Some(1));
    assert!(error.is_some());
    assert_eq!(backend.cart_lines()[0].quantity(), 1);
}

#[tokio::test]
async fn quantity_above_stock_is_refused_locally() {
    let backend = backend();
    let store = loaded_store(&backend).await;

    settle(vec![store.send(update(21)).await.unwrap()]).await;

    let (quantity, error) = store
        .state(|s| {
            (
                s.cart.line(&CartItemId::new("ci-1")).map(CartLineItem::quantity),
                s.cart.error.clone(),
            )
        })
        .await;
    assert_eq!(quantity, Some(1));
    assert!(error.is_some());
    assert!(backend.update_calls().is_empty());
}

#[tokio::test]
async fn added_product_appears_with_server_line() {
    let backend = backend();
    let store = loaded_store(&backend).await;

    settle(vec![
        store
            .send(StorefrontAction::Cart(CartAction::AddItem {
                product_id: ProductId::new("p-shawl"),
                quantity: 2,
                variant: None,
            }))
            .await
            .unwrap(),
    ])
    .await;

    let (line, total) = store
        .state(|s| {
            (
                s.cart
                    .line_for_product(&ProductId::new("p-shawl"), None)
                    .cloned(),
                s.cart.summary().total_amount,
            )
        })
        .await;
    let line = line.unwrap();
    assert_eq!(line.quantity(), 2);
    assert_eq!(line.total_price(), dec!(5000));
    assert_eq!(total, dec!(5100));
    assert_eq!(backend.cart_lines().len(), 2);
}

// ============================================================================
// Wishlist
// ============================================================================

#[tokio::test]
async fn even_number_of_toggles_leaves_product_unsaved() {
    let backend = backend();
    let store = loaded_store(&backend).await;

    let first = store.send(toggle("p-shawl")).await.unwrap();
    let second = store.send(toggle("p-shawl")).await.unwrap();
    assert!(
        !store
            .state(|s| s.wishlist.is_saved(&ProductId::new("p-shawl")))
            .await
    );
    settle(vec![first, second]).await;

    let (saved, count) = store
        .state(|s| (s.wishlist.is_saved(&ProductId::new("p-shawl")), s.wishlist.len()))
        .await;
    assert!(!saved);
    assert_eq!(count, 0);
    assert!(backend.wishlist_products().is_empty());
    assert_eq!(backend.wishlist_calls().len(), 2);
}

#[tokio::test]
async fn odd_number_of_toggles_saves_with_one_request() {
    let backend = backend();
    let store = loaded_store(&backend).await;

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(store.send(toggle("p-shawl")).await.unwrap());
    }
    settle(handles).await;

    let (saved, names) = store
        .state(|s| {
            (
                s.wishlist.is_saved(&ProductId::new("p-shawl")),
                s.wishlist
                    .items()
                    .iter()
                    .map(|item| item.product_name.clone())
                    .collect::<Vec<_>>(),
            )
        })
        .await;
    assert!(saved);
    assert_eq!(names, vec!["Pashmina Shawl".to_string()]);
    assert_eq!(backend.wishlist_products(), vec![ProductId::new("p-shawl")]);
    assert_eq!(
        backend.wishlist_calls(),
        vec![(Operation::AddToWishlist, ProductId::new("p-shawl"))]
    );
}

#[tokio::test]
async fn failed_save_rolls_back_after_status_check() {
    let backend = backend();
    let store = loaded_store(&backend).await;
    backend.fail_next(
        Operation::AddToWishlist,
        StorefrontError::Api {
            status: 500,
            message: "Internal error".to_string(),
        },
    );

    settle(vec![store.send(toggle("p-tea")).await.unwrap()]).await;

    let (saved, error) = store
        .state(|s| {
            (
                s.wishlist.is_saved(&ProductId::new("p-tea")),
                s.wishlist.error.clone(),
            )
        })
        .await;
    assert!(!saved);
    assert!(error.is_some());
    assert!(backend.wishlist_products().is_empty());
}
