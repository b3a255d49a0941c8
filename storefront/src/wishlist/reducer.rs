//! Wishlist reducer.

use super::{ClearOp, MembershipOp, WishlistAction, WishlistEnvironment, WishlistState};
use crate::providers::WishlistApi;
use crate::types::{ProductId, WishlistItem};
use doko_core::effect::Effect;
use doko_core::reducer::Reducer;
use doko_core::{SmallVec, smallvec};
use std::collections::HashMap;
use std::marker::PhantomData;
use tracing::{debug, warn};

type Effects = SmallVec<[Effect<WishlistAction>; 4]>;

/// Reducer for [`WishlistState`].
#[derive(Debug)]
pub struct WishlistReducer<B> {
    _phantom: PhantomData<fn() -> B>,
}

impl<B> WishlistReducer<B> {
    /// Create a new wishlist reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B> Default for WishlistReducer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Clone for WishlistReducer<B> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

fn membership_effect<B: WishlistApi + Clone + 'static>(
    api: &B,
    product_id: ProductId,
    seq: u64,
    saved: bool,
) -> Effect<WishlistAction> {
    let api = api.clone();
    Effect::Future(Box::pin(async move {
        let result = if saved {
            api.add_to_wishlist(&product_id).await.map(Some)
        } else {
            api.remove_from_wishlist(&product_id).await.map(|()| None)
        };
        Some(WishlistAction::MembershipSettled {
            product_id,
            seq,
            result: result.map_err(|e| e.to_string()),
        })
    }))
}

fn check_effect<B: WishlistApi + Clone + 'static>(
    api: &B,
    product_id: ProductId,
    seq: u64,
) -> Effect<WishlistAction> {
    let api = api.clone();
    Effect::Future(Box::pin(async move {
        let result = api
            .is_in_wishlist(&product_id)
            .await
            .map_err(|e| e.to_string());
        Some(WishlistAction::StatusChecked {
            product_id,
            seq,
            result,
        })
    }))
}

impl<B: WishlistApi + Clone + 'static> WishlistReducer<B> {
    fn start_fetch(state: &mut WishlistState, env: &WishlistEnvironment<B>) -> Effect<WishlistAction> {
        let seq = state.next_seq();
        state.fetch_seq = seq;
        state.loading = true;

        let api = env.api.clone();
        Effect::Future(Box::pin(async move {
            let result = api.fetch_wishlist().await.map_err(|e| e.to_string());
            Some(WishlistAction::ItemsFetched { seq, result })
        }))
    }

    fn start_check(
        state: &mut WishlistState,
        env: &WishlistEnvironment<B>,
        product_id: ProductId,
    ) -> Effect<WishlistAction> {
        let seq = state.next_seq();
        state.checks.insert(product_id.clone(), seq);
        check_effect(&env.api, product_id, seq)
    }

    fn apply_fetched(state: &mut WishlistState, seq: u64, result: Result<Vec<WishlistItem>, String>) {
        if seq != state.fetch_seq {
            debug!(seq, current = state.fetch_seq, "Ignoring superseded wishlist fetch");
            return;
        }
        state.loading = false;

        let items = match result {
            Ok(items) => items,
            Err(message) => {
                warn!(%message, "Wishlist fetch failed");
                state.error = Some(message);
                return;
            },
        };

        state.status = items
            .iter()
            .map(|item| (item.product_id.clone(), true))
            .collect();
        *state.items_mut() = items;
        state.loaded = true;

        let products: Vec<ProductId> = state.ops.keys().cloned().collect();
        for product_id in products {
            let position = state.position(&product_id);
            let confirmed_item = position.map(|index| state.items()[index].clone());
            let Some(op) = state.ops.get_mut(&product_id) else {
                continue;
            };
            op.confirmed = confirmed_item.is_some();
            op.confirmed_item = confirmed_item;
            if let Some(index) = position {
                op.position = index;
            }
            let desired = op.latest();
            state.show(&product_id, desired);
        }

        if state.clear_op.is_some() {
            state.items_mut().clear();
            state.status.clear();
        }
    }

    /// Move a product towards `desired` membership.
    fn set_membership(
        state: &mut WishlistState,
        env: &WishlistEnvironment<B>,
        product_id: ProductId,
        desired: bool,
    ) -> Effects {
        if let Some(op) = state.ops.get_mut(&product_id) {
            op.queued = Some(desired);
            state.show(&product_id, desired);
            state.refresh_flags(&product_id);
            debug!(%product_id, desired, "Wishlist request in flight, desire queued");
            return smallvec![Effect::None];
        }

        let current = state.is_saved(&product_id);
        if current == desired {
            return smallvec![Effect::None];
        }

        let position = state.position(&product_id);
        let confirmed_item = position.map(|index| state.items()[index].clone());
        let seq = state.next_seq();
        state.ops.insert(
            product_id.clone(),
            MembershipOp {
                seq,
                in_flight: desired,
                queued: None,
                confirmed: current,
                confirmed_item,
                position: position.unwrap_or(0),
            },
        );
        state.show(&product_id, desired);
        state.refresh_flags(&product_id);
        smallvec![membership_effect(&env.api, product_id, seq, desired)]
    }

    fn membership_settled(
        state: &mut WishlistState,
        env: &WishlistEnvironment<B>,
        product_id: ProductId,
        seq: u64,
        result: Result<Option<WishlistItem>, String>,
    ) -> Effects {
        let Some(mut op) = state.ops.remove(&product_id) else {
            debug!(%product_id, seq, "Ignoring wishlist result without pending request");
            return smallvec![Effect::None];
        };
        if op.seq != seq {
            debug!(%product_id, seq, current = op.seq, "Ignoring stale wishlist result");
            state.ops.insert(product_id, op);
            return smallvec![Effect::None];
        }

        let effects = match result {
            Ok(item) => {
                op.confirmed = item.is_some();
                if item.is_some() {
                    op.confirmed_item = item;
                }

                match op.queued.take() {
                    Some(next) if next != op.confirmed => {
                        let seq = state.next_seq();
                        op.seq = seq;
                        op.in_flight = next;
                        state.ops.insert(product_id.clone(), op);
                        state.refresh_flags(&product_id);
                        return smallvec![membership_effect(&env.api, product_id, seq, next)];
                    },
                    _ => {
                        state.show(&product_id, op.confirmed);
                        if let (true, Some(item)) = (op.confirmed, op.confirmed_item) {
                            state.place_item(item, op.position);
                        }
                        smallvec![Effect::None]
                    },
                }
            },
            Err(message) => {
                warn!(%product_id, %message, "Wishlist update failed, rolling back");
                state.show(&product_id, op.confirmed);
                if let (true, Some(item)) = (op.confirmed, op.confirmed_item) {
                    state.place_item(item, op.position);
                }
                state.error = Some(message);
                smallvec![Self::start_check(state, env, product_id.clone())]
            },
        };

        state.refresh_flags(&product_id);
        effects
    }

    fn status_checked(
        state: &mut WishlistState,
        product_id: &ProductId,
        seq: u64,
        result: Result<bool, String>,
    ) {
        if state.checks.get(product_id) != Some(&seq) {
            debug!(%product_id, seq, "Ignoring stale wishlist status");
            return;
        }
        state.checks.remove(product_id);

        if state.ops.contains_key(product_id) {
            // The pending mutation decides the outcome.
            return;
        }

        match result {
            Ok(saved) => state.show(product_id, saved),
            Err(message) => warn!(%product_id, %message, "Wishlist status check failed"),
        }
    }

    fn clear_all(state: &mut WishlistState, env: &WishlistEnvironment<B>) -> Effects {
        let had_ops = !state.ops.is_empty();
        let (items, status, refetch) = match state.clear_op.take() {
            Some(previous) => (previous.items, previous.status, previous.refetch || had_ops),
            None => (state.items().to_vec(), state.status.clone(), had_ops),
        };

        state.ops.clear();
        state.add_loading.clear();
        state.remove_loading.clear();
        state.items_mut().clear();
        state.status = HashMap::new();

        let seq = state.next_seq();
        state.clear_op = Some(ClearOp {
            seq,
            items,
            status,
            refetch,
        });

        let api = env.api.clone();
        smallvec![Effect::Future(Box::pin(async move {
            let result = api.clear_wishlist().await.map_err(|e| e.to_string());
            Some(WishlistAction::Cleared { seq, result })
        }))]
    }

    fn cleared(
        state: &mut WishlistState,
        env: &WishlistEnvironment<B>,
        seq: u64,
        result: Result<(), String>,
    ) -> Effects {
        let Some(op) = state.clear_op.take() else {
            return smallvec![Effect::None];
        };
        if op.seq != seq {
            state.clear_op = Some(op);
            return smallvec![Effect::None];
        }

        if let Err(message) = result {
            warn!(%message, "Clearing the wishlist failed, rolling back");
            *state.items_mut() = op.items;
            state.status = op.status;
            state.error = Some(message);
        }

        if op.refetch {
            smallvec![Self::start_fetch(state, env)]
        } else {
            smallvec![Effect::None]
        }
    }
}

impl<B: WishlistApi + Clone + 'static> Reducer for WishlistReducer<B> {
    type State = WishlistState;
    type Action = WishlistAction;
    type Environment = WishlistEnvironment<B>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            WishlistAction::FetchItems => smallvec![Self::start_fetch(state, env)],

            WishlistAction::AddItem { product_id } => {
                Self::set_membership(state, env, product_id, true)
            },

            WishlistAction::RemoveItem { product_id } => {
                Self::set_membership(state, env, product_id, false)
            },

            WishlistAction::Toggle { product_id } => {
                let desired = !state.is_saved(&product_id);
                Self::set_membership(state, env, product_id, desired)
            },

            WishlistAction::ClearAll => Self::clear_all(state, env),

            WishlistAction::ClearError => {
                state.error = None;
                smallvec![Effect::None]
            },

            WishlistAction::CheckStatus { product_id } => {
                smallvec![Self::start_check(state, env, product_id)]
            },

            WishlistAction::ItemsFetched { seq, result } => {
                Self::apply_fetched(state, seq, result);
                smallvec![Effect::None]
            },

            WishlistAction::MembershipSettled {
                product_id,
                seq,
                result,
            } => Self::membership_settled(state, env, product_id, seq, result),

            WishlistAction::StatusChecked {
                product_id,
                seq,
                result,
            } => {
                Self::status_checked(state, &product_id, seq, result);
                smallvec![Effect::None]
            },

            WishlistAction::Cleared { seq, result } => Self::cleared(state, env, seq, result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CatalogProduct, MockBackend};
    use crate::types::MerchantId;
    use doko_testing::{ReducerTest, assertions};
    use rust_decimal_macros::dec;

    fn pashmina() -> ProductId {
        ProductId::new("p-pashmina")
    }

    fn saved_item() -> WishlistItem {
        WishlistItem::new(pashmina(), "Pashmina Shawl", dec!(3500), MerchantId::new("m-1"))
    }

    fn env() -> WishlistEnvironment<MockBackend> {
        WishlistEnvironment::new(MockBackend::new().with_product(CatalogProduct::new(
            "p-pashmina",
            "Pashmina Shawl",
            dec!(3500),
            "m-1",
            4,
        )))
    }

    fn reduce(state: &mut WishlistState, action: WishlistAction) -> Effects {
        WishlistReducer::<MockBackend>::new().reduce(state, action, &env())
    }

    fn toggle() -> WishlistAction {
        WishlistAction::Toggle {
            product_id: pashmina(),
        }
    }

    fn settled(seq: u64, result: Result<Option<WishlistItem>, String>) -> WishlistAction {
        WishlistAction::MembershipSettled {
            product_id: pashmina(),
            seq,
            result,
        }
    }

    #[test]
    fn toggle_saves_optimistically() {
        ReducerTest::new(WishlistReducer::<MockBackend>::new())
            .with_env(env())
            .given_state(WishlistState::default())
            .when_action(toggle())
            .then_state(|state| {
                assert!(state.is_saved(&pashmina()));
                assert!(state.add_loading.contains(&pashmina()));
            })
            .then_actions(|actions| {
                assert!(matches!(
                    actions,
                    [WishlistAction::MembershipSettled { seq: 1, result: Ok(Some(_)), .. }]
                ));
            })
            .run();
    }

    #[test]
    fn two_rapid_toggles_return_to_start() {
        let mut state = WishlistState::default();

        assertions::assert_effects_count(&reduce(&mut state, toggle()), 1);
        assertions::assert_no_effects(&reduce(&mut state, toggle()));
        assert!(!state.is_saved(&pashmina()));

        // The add lands; the queued removal differs from it and is sent.
        let effects = reduce(&mut state, settled(1, Ok(Some(saved_item()))));
        assertions::assert_has_future_effect(&effects);
        assert!(!state.is_saved(&pashmina()));
        assert!(state.remove_loading.contains(&pashmina()));

        assertions::assert_no_effects(&reduce(&mut state, settled(2, Ok(None))));
        assert!(!state.is_saved(&pashmina()));
        assert!(state.is_empty());
        assert!(state.add_loading.is_empty() && state.remove_loading.is_empty());
    }

    #[test]
    fn three_rapid_toggles_send_one_request() {
        let mut state = WishlistState::default();
        let _ = reduce(&mut state, toggle());
        let _ = reduce(&mut state, toggle());
        let _ = reduce(&mut state, toggle());
        assert!(state.is_saved(&pashmina()));

        // Queued desire (saved) equals the confirmed membership: nothing to send.
        assertions::assert_no_effects(&reduce(&mut state, settled(1, Ok(Some(saved_item())))));
        assert!(state.is_saved(&pashmina()));
        assert_eq!(state.items(), [saved_item()]);
    }

    #[test]
    fn failed_removal_restores_item_and_checks_status() {
        let mut state = WishlistState::with_items(vec![saved_item()]);
        let _ = reduce(
            &mut state,
            WishlistAction::RemoveItem {
                product_id: pashmina(),
            },
        );
        assert!(state.is_empty());

        let effects = reduce(&mut state, settled(1, Err("Request failed".to_string())));
        assertions::assert_has_future_effect(&effects);
        assert!(state.is_saved(&pashmina()));
        assert_eq!(state.items(), [saved_item()]);
        assert_eq!(state.error.as_deref(), Some("Request failed"));
    }

    #[test]
    fn adding_saved_product_is_a_no_op() {
        let mut state = WishlistState::with_items(vec![saved_item()]);
        let effects = reduce(
            &mut state,
            WishlistAction::AddItem {
                product_id: pashmina(),
            },
        );
        assertions::assert_no_effects(&effects);
    }

    #[test]
    fn status_check_is_ignored_while_mutation_pending() {
        let mut state = WishlistState::default();
        let _ = reduce(
            &mut state,
            WishlistAction::CheckStatus {
                product_id: pashmina(),
            },
        );
        let _ = reduce(&mut state, toggle());

        let _ = reduce(
            &mut state,
            WishlistAction::StatusChecked {
                product_id: pashmina(),
                seq: 1,
                result: Ok(false),
            },
        );
        assert!(state.is_saved(&pashmina()));
    }

    #[test]
    fn fetch_rebuilds_status_and_keeps_pending_desire() {
        let mut state = WishlistState::default();
        let _ = reduce(&mut state, WishlistAction::FetchItems);
        let _ = reduce(&mut state, toggle());

        let other = WishlistItem::new("p-other".into(), "Singing Bowl", dec!(900), MerchantId::new("m-2"));
        let _ = reduce(
            &mut state,
            WishlistAction::ItemsFetched {
                seq: 1,
                result: Ok(vec![other]),
            },
        );

        assert!(state.is_saved(&ProductId::new("p-other")));
        assert!(state.is_saved(&pashmina()));
        assert!(!state.loading);
    }
}
