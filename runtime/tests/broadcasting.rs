//! Integration tests for Store action broadcasting
//!
//! A request/response flow (stock reservation with a follow-up price quote)
//! observed through `send_and_wait_for` and `subscribe_actions`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use doko_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use doko_runtime::{Store, StoreError};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ReservationAction {
    Reserve { sku: u64, quantity: u32 },
    Reserved { sku: u64, quantity: u32 },
    Quoted { sku: u64, total_minor: u64 },
    Rejected { sku: u64, reason: String },
}

#[derive(Debug, Clone, Default)]
struct ReservationState {
    reserved: Vec<(u64, u32)>,
    quotes: Vec<u64>,
}

#[derive(Clone)]
struct ReservationEnvironment {
    unit_price_minor: u64,
    stock: u32,
}

struct ReservationReducer;

impl Reducer for ReservationReducer {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ReservationAction::Reserve { sku, quantity } => {
                let stock = env.stock;
                smallvec![Effect::Future(Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    if quantity > stock {
                        Some(ReservationAction::Rejected {
                            sku,
                            reason: format!("only {stock} left"),
                        })
                    } else {
                        Some(ReservationAction::Reserved { sku, quantity })
                    }
                }))]
            },
            ReservationAction::Reserved { sku, quantity } => {
                state.reserved.push((sku, quantity));
                let total_minor = env.unit_price_minor * u64::from(quantity);
                smallvec![Effect::Future(Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some(ReservationAction::Quoted { sku, total_minor })
                }))]
            },
            ReservationAction::Quoted { total_minor, .. } => {
                state.quotes.push(total_minor);
                smallvec![Effect::None]
            },
            ReservationAction::Rejected { .. } => smallvec![Effect::None],
        }
    }
}

fn store() -> Store<ReservationState, ReservationAction, ReservationEnvironment, ReservationReducer>
{
    Store::new(
        ReservationState::default(),
        ReservationReducer,
        ReservationEnvironment {
            unit_price_minor: 55_000,
            stock: 3,
        },
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_send_and_wait_for_follow_up_action() {
    let store = store();

    let result = store
        .send_and_wait_for(
            ReservationAction::Reserve { sku: 7, quantity: 2 },
            |action| matches!(action, ReservationAction::Quoted { sku: 7, .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        ReservationAction::Quoted {
            sku: 7,
            total_minor: 110_000
        }
    );
    assert_eq!(store.state(|s| s.reserved.clone()).await, vec![(7, 2)]);
}

#[tokio::test]
async fn test_send_and_wait_for_rejection() {
    let store = store();

    let result = store
        .send_and_wait_for(
            ReservationAction::Reserve { sku: 9, quantity: 5 },
            |action| {
                matches!(
                    action,
                    ReservationAction::Quoted { .. } | ReservationAction::Rejected { .. }
                )
            },
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert!(matches!(result, ReservationAction::Rejected { sku: 9, .. }));
    assert!(store.state(|s| s.reserved.is_empty()).await);
}

#[tokio::test]
async fn test_send_and_wait_for_timeout() {
    let store = store();

    let result = store
        .send_and_wait_for(
            ReservationAction::Reserve { sku: 1, quantity: 1 },
            |action| matches!(action, ReservationAction::Rejected { .. }),
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(result.unwrap_err(), StoreError::Timeout);
}

#[tokio::test]
async fn test_subscriber_sees_every_feedback_action_in_order() {
    let store = store();
    let mut rx = store.subscribe_actions();

    let mut handle = store
        .send(ReservationAction::Reserve { sku: 3, quantity: 1 })
        .await
        .unwrap();
    handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        ReservationAction::Reserved { sku: 3, quantity: 1 }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        ReservationAction::Quoted {
            sku: 3,
            total_minor: 55_000
        }
    );
}

#[tokio::test]
async fn test_concurrent_waiters_get_their_own_results() {
    let store = store();

    let mut tasks = Vec::new();
    for sku in 1..=3_u64 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .send_and_wait_for(
                    ReservationAction::Reserve { sku, quantity: 1 },
                    move |action| matches!(action, ReservationAction::Quoted { sku: s, .. } if *s == sku),
                    Duration::from_secs(1),
                )
                .await
        }));
    }

    for task in tasks {
        let action = task.await.unwrap().unwrap();
        assert!(matches!(action, ReservationAction::Quoted { total_minor: 55_000, .. }));
    }
    assert_eq!(store.state(|s| s.quotes.len()).await, 3);
}
