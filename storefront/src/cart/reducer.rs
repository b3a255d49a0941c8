//! Cart reducer.
//!
//! Three-phase commands: apply optimistically, issue the request, then
//! reconcile with the server's answer or roll back to the last confirmed
//! snapshot.

use super::{AddOp, CartAction, CartEnvironment, CartState, ClearOp, LineIntent, LineOp};
use crate::error::StorefrontError;
use crate::providers::CartApi;
use crate::types::{AddToCartRequest, CartItemId, CartLineItem, CartSnapshot, ProductId};
use doko_core::effect::Effect;
use doko_core::reducer::Reducer;
use doko_core::{SmallVec, smallvec};
use std::marker::PhantomData;
use tracing::{debug, warn};

type Effects = SmallVec<[Effect<CartAction>; 4]>;

/// Reducer for [`CartState`].
///
/// # Type Parameters
///
/// - `B`: Cart backend
#[derive(Debug)]
pub struct CartReducer<B> {
    _phantom: PhantomData<fn() -> B>,
}

impl<B> CartReducer<B> {
    /// Create a new cart reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B> Default for CartReducer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Clone for CartReducer<B> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Effects
// ═══════════════════════════════════════════════════════════════════════

fn fetch_effect<B: CartApi + Clone + 'static>(api: &B, seq: u64) -> Effect<CartAction> {
    let api = api.clone();
    Effect::Future(Box::pin(async move {
        let result = api.fetch_cart().await.map_err(|e| e.to_string());
        Some(CartAction::ItemsFetched { seq, result })
    }))
}

fn add_effect<B: CartApi + Clone + 'static>(
    api: &B,
    seq: u64,
    request: AddToCartRequest,
) -> Effect<CartAction> {
    let api = api.clone();
    Effect::Future(Box::pin(async move {
        let result = api.add_item(&request).await.map_err(|e| e.to_string());
        Some(CartAction::ItemAdded {
            product_id: request.product_id,
            seq,
            result,
        })
    }))
}

fn line_effect<B: CartApi + Clone + 'static>(
    api: &B,
    cart_item_id: CartItemId,
    seq: u64,
    intent: LineIntent,
) -> Effect<CartAction> {
    let api = api.clone();
    Effect::Future(Box::pin(async move {
        match intent {
            LineIntent::Quantity(quantity) => {
                let result = api
                    .update_item(&cart_item_id, quantity)
                    .await
                    .map_err(|e| e.to_string());
                Some(CartAction::ItemUpdated {
                    cart_item_id,
                    seq,
                    result,
                })
            },
            LineIntent::Remove => {
                let result = api
                    .remove_item(&cart_item_id)
                    .await
                    .map_err(|e| e.to_string());
                Some(CartAction::ItemRemoved {
                    cart_item_id,
                    seq,
                    result,
                })
            },
        }
    }))
}

fn clear_effect<B: CartApi + Clone + 'static>(api: &B, seq: u64) -> Effect<CartAction> {
    let api = api.clone();
    Effect::Future(Box::pin(async move {
        let result = api.clear_cart().await.map_err(|e| e.to_string());
        Some(CartAction::Cleared { seq, result })
    }))
}

// ═══════════════════════════════════════════════════════════════════════
// State helpers
// ═══════════════════════════════════════════════════════════════════════

fn product_lines(state: &CartState, product_id: &ProductId) -> Vec<(usize, CartLineItem)> {
    state
        .lines()
        .iter()
        .enumerate()
        .filter(|(_, line)| &line.product_id == product_id)
        .map(|(index, line)| (index, line.clone()))
        .collect()
}

fn coalesce(queue: &mut Vec<AddToCartRequest>, request: AddToCartRequest) {
    match queue
        .iter_mut()
        .find(|queued| queued.selected_variant == request.selected_variant)
    {
        Some(queued) => queued.quantity = queued.quantity.saturating_add(request.quantity),
        None => queue.push(request),
    }
}

fn increment_matching(state: &mut CartState, request: &AddToCartRequest) {
    if let Some(line) = state
        .lines_mut()
        .iter_mut()
        .find(|line| line.matches(&request.product_id, request.selected_variant.as_deref()))
    {
        line.set_quantity(line.quantity().saturating_add(request.quantity));
    }
}

fn restore_line(
    state: &mut CartState,
    id: &CartItemId,
    confirmed: Option<CartLineItem>,
    position: usize,
) {
    match (state.position(id), confirmed) {
        (Some(index), Some(line)) => state.lines_mut()[index] = line,
        (None, Some(line)) => {
            let at = position.min(state.lines().len());
            state.lines_mut().insert(at, line);
        },
        (Some(index), None) => {
            state.lines_mut().remove(index);
        },
        (None, None) => {},
    }
}

/// Re-apply intents still pending on top of freshly fetched lines.
fn reapply_pending(state: &mut CartState) {
    let ids: Vec<CartItemId> = state.line_ops.keys().cloned().collect();
    for id in ids {
        let position = state.position(&id);
        let confirmed = position.map(|index| state.lines()[index].clone());
        let Some(op) = state.line_ops.get_mut(&id) else {
            continue;
        };
        op.confirmed = confirmed;
        if let Some(index) = position {
            op.position = index;
        }
        match (op.latest(), position) {
            (LineIntent::Quantity(quantity), Some(index)) => {
                state.lines_mut()[index].set_quantity(quantity);
            },
            (LineIntent::Remove, Some(index)) => {
                state.lines_mut().remove(index);
            },
            (_, None) => {},
        }
    }

    let products: Vec<ProductId> = state.add_ops.keys().cloned().collect();
    for product_id in products {
        let confirmed = product_lines(state, &product_id);
        let Some(op) = state.add_ops.get_mut(&product_id) else {
            continue;
        };
        op.confirmed = confirmed;
        let pending: Vec<AddToCartRequest> = std::iter::once(op.in_flight.clone())
            .chain(op.queued.iter().cloned())
            .collect();
        for request in &pending {
            increment_matching(state, request);
        }
    }

    if state.clear_op.is_some() {
        state.lines_mut().clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Command handlers
// ═══════════════════════════════════════════════════════════════════════

impl<B: CartApi + Clone + 'static> CartReducer<B> {
    fn start_fetch(state: &mut CartState, env: &CartEnvironment<B>) -> Effect<CartAction> {
        let seq = state.next_seq();
        state.fetch_seq = seq;
        state.loading = true;
        fetch_effect(&env.api, seq)
    }

    fn apply_fetched(state: &mut CartState, seq: u64, result: Result<CartSnapshot, String>) {
        if seq != state.fetch_seq {
            debug!(seq, current = state.fetch_seq, "Ignoring superseded cart fetch");
            return;
        }
        state.loading = false;

        match result {
            Ok(snapshot) => {
                *state.lines_mut() = snapshot.into_lines();
                state.loaded = true;
                reapply_pending(state);
                state.recompute();
            },
            Err(message) => {
                warn!(%message, "Cart fetch failed");
                state.error = Some(message);
            },
        }
    }

    fn add_item(
        state: &mut CartState,
        env: &CartEnvironment<B>,
        product_id: ProductId,
        quantity: u32,
        variant: Option<String>,
    ) -> Effects {
        if quantity == 0 {
            state.error = Some(
                StorefrontError::validation("quantity", "Quantity must be at least 1").to_string(),
            );
            return smallvec![Effect::None];
        }

        if let Some(line) = state.line_for_product(&product_id, variant.as_deref()) {
            if line.quantity().saturating_add(quantity) > line.stock_quantity {
                let available = line.stock_quantity;
                state.error = Some(StorefrontError::InsufficientStock { available }.to_string());
                return smallvec![Effect::None];
            }
        }

        let request = AddToCartRequest {
            product_id: product_id.clone(),
            quantity,
            selected_variant: variant,
        };
        state.add_loading.insert(product_id.clone());

        if let Some(op) = state.add_ops.get_mut(&product_id) {
            coalesce(&mut op.queued, request.clone());
            increment_matching(state, &request);
            state.recompute();
            debug!(%product_id, "Add already in flight, coalesced");
            return smallvec![Effect::None];
        }

        let confirmed = product_lines(state, &product_id);
        increment_matching(state, &request);
        state.recompute();

        let seq = state.next_seq();
        state.add_ops.insert(
            product_id,
            AddOp {
                seq,
                in_flight: request.clone(),
                queued: Vec::new(),
                confirmed,
            },
        );
        smallvec![add_effect(&env.api, seq, request)]
    }

    fn item_added(
        state: &mut CartState,
        env: &CartEnvironment<B>,
        product_id: ProductId,
        seq: u64,
        result: Result<CartLineItem, String>,
    ) -> Effects {
        let Some(mut op) = state.add_ops.remove(&product_id) else {
            debug!(%product_id, seq, "Ignoring add result without pending add");
            return smallvec![Effect::None];
        };
        if op.seq != seq {
            debug!(%product_id, seq, current = op.seq, "Ignoring stale add result");
            state.add_ops.insert(product_id, op);
            return smallvec![Effect::None];
        }

        let effects = match result {
            Ok(line) => {
                let line = line.normalized();
                let index = state.position(&line.id).or_else(|| {
                    state.lines().iter().position(|visible| {
                        visible.matches(&line.product_id, line.selected_variant.as_deref())
                    })
                });

                match op.confirmed.iter_mut().find(|(_, c)| c.id == line.id) {
                    Some((_, confirmed)) => *confirmed = line.clone(),
                    None => op
                        .confirmed
                        .push((index.unwrap_or(state.lines().len()), line.clone())),
                }

                let pending: u32 = op
                    .queued
                    .iter()
                    .filter(|r| line.matches(&r.product_id, r.selected_variant.as_deref()))
                    .map(|r| r.quantity)
                    .sum();
                let mut visible = line.clone();
                visible.set_quantity(line.quantity().saturating_add(pending));
                match index {
                    Some(index) => state.lines_mut()[index] = visible,
                    None => state.lines_mut().push(visible),
                }

                if op.queued.is_empty() {
                    state.add_loading.remove(&product_id);
                    smallvec![Effect::None]
                } else {
                    let next = op.queued.remove(0);
                    let seq = state.next_seq();
                    op.seq = seq;
                    op.in_flight = next.clone();
                    state.add_ops.insert(product_id, op);
                    smallvec![add_effect(&env.api, seq, next)]
                }
            },
            Err(message) => {
                warn!(%product_id, %message, "Add to cart failed, rolling back");
                state.lines_mut().retain(|line| line.product_id != product_id);
                let mut confirmed = op.confirmed;
                confirmed.sort_by_key(|(position, _)| *position);
                for (position, line) in confirmed {
                    let at = position.min(state.lines().len());
                    state.lines_mut().insert(at, line);
                }
                state.add_loading.remove(&product_id);
                state.error = Some(message);
                smallvec![Effect::None]
            },
        };

        state.recompute();
        effects
    }

    fn update_item(
        state: &mut CartState,
        env: &CartEnvironment<B>,
        id: CartItemId,
        quantity: i64,
    ) -> Effects {
        if quantity <= 0 {
            return Self::remove_item(state, env, id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let Some(index) = state.position(&id) else {
            debug!(%id, "Ignoring update for a line not in the cart");
            return smallvec![Effect::None];
        };
        let line = &state.lines()[index];
        if quantity > line.stock_quantity {
            let available = line.stock_quantity;
            state.error = Some(StorefrontError::InsufficientStock { available }.to_string());
            return smallvec![Effect::None];
        }
        if line.quantity() == quantity && !state.line_ops.contains_key(&id) {
            return smallvec![Effect::None];
        }

        let before = line.clone();
        state.lines_mut()[index].set_quantity(quantity);
        state.recompute();
        Self::submit_line(state, env, id, LineIntent::Quantity(quantity), before, index)
    }

    fn remove_item(state: &mut CartState, env: &CartEnvironment<B>, id: CartItemId) -> Effects {
        let Some(index) = state.position(&id) else {
            debug!(%id, "Ignoring removal of a line not in the cart");
            return smallvec![Effect::None];
        };

        let before = state.lines_mut().remove(index);
        state.recompute();
        Self::submit_line(state, env, id, LineIntent::Remove, before, index)
    }

    /// Issue a line request, or queue the intent behind the one in flight.
    fn submit_line(
        state: &mut CartState,
        env: &CartEnvironment<B>,
        id: CartItemId,
        intent: LineIntent,
        before: CartLineItem,
        position: usize,
    ) -> Effects {
        if let Some(op) = state.line_ops.get_mut(&id) {
            op.queued = Some(intent);
            debug!(%id, ?intent, "Line request in flight, intent queued");
            state.refresh_line_flags(&id);
            return smallvec![Effect::None];
        }

        let seq = state.next_seq();
        state.line_ops.insert(
            id.clone(),
            LineOp {
                seq,
                in_flight: intent,
                queued: None,
                confirmed: Some(before),
                position,
                issued: 1,
            },
        );
        state.refresh_line_flags(&id);
        smallvec![line_effect(&env.api, id, seq, intent)]
    }

    fn settle_line(
        state: &mut CartState,
        env: &CartEnvironment<B>,
        id: CartItemId,
        seq: u64,
        outcome: Result<Option<CartLineItem>, String>,
    ) -> Effects {
        let Some(mut op) = state.line_ops.remove(&id) else {
            debug!(%id, seq, "Ignoring line result without pending request");
            return smallvec![Effect::None];
        };
        if op.seq != seq {
            debug!(%id, seq, current = op.seq, "Ignoring stale line result");
            state.line_ops.insert(id, op);
            return smallvec![Effect::None];
        }

        let effects = match outcome {
            Ok(confirmed) => {
                op.confirmed = confirmed.map(CartLineItem::normalized);
                match op.queued.take() {
                    Some(next) if !op.satisfied_by_confirmed(next) => {
                        let seq = state.next_seq();
                        op.seq = seq;
                        op.in_flight = next;
                        op.issued += 1;
                        state.line_ops.insert(id.clone(), op);
                        state.refresh_line_flags(&id);
                        return smallvec![line_effect(&env.api, id, seq, next)];
                    },
                    _ => {
                        let position = op.position;
                        match (state.position(&id), op.confirmed) {
                            (Some(index), Some(line)) => state.lines_mut()[index] = line,
                            (Some(index), None) => {
                                state.lines_mut().remove(index);
                            },
                            (None, Some(line)) if op.in_flight != LineIntent::Remove => {
                                let at = position.min(state.lines().len());
                                state.lines_mut().insert(at, line);
                            },
                            _ => {},
                        }
                        smallvec![Effect::None]
                    },
                }
            },
            Err(message) => {
                warn!(%id, %message, "Cart line request failed, rolling back");
                restore_line(state, &id, op.confirmed, op.position);
                state.error = Some(message);
                if op.issued > 1 {
                    // An earlier request for this line reached the server.
                    smallvec![Self::start_fetch(state, env)]
                } else {
                    smallvec![Effect::None]
                }
            },
        };

        state.refresh_line_flags(&id);
        state.recompute();
        effects
    }

    fn clear_all(state: &mut CartState, env: &CartEnvironment<B>) -> Effects {
        let had_ops = !state.line_ops.is_empty() || !state.add_ops.is_empty();
        let (snapshot, refetch) = match state.clear_op.take() {
            Some(previous) => (previous.snapshot, previous.refetch || had_ops),
            None => (state.lines().to_vec(), had_ops),
        };

        state.line_ops.clear();
        state.add_ops.clear();
        state.add_loading.clear();
        state.update_loading.clear();
        state.remove_loading.clear();
        state.lines_mut().clear();
        state.recompute();

        let seq = state.next_seq();
        state.clear_op = Some(ClearOp {
            seq,
            snapshot,
            refetch,
        });
        smallvec![clear_effect(&env.api, seq)]
    }

    fn cleared(
        state: &mut CartState,
        env: &CartEnvironment<B>,
        seq: u64,
        result: Result<(), String>,
    ) -> Effects {
        let Some(op) = state.clear_op.take() else {
            return smallvec![Effect::None];
        };
        if op.seq != seq {
            debug!(seq, current = op.seq, "Ignoring stale clear result");
            state.clear_op = Some(op);
            return smallvec![Effect::None];
        }

        if let Err(message) = result {
            warn!(%message, "Clearing the cart failed, rolling back");
            *state.lines_mut() = op.snapshot;
            state.error = Some(message);
            state.recompute();
        }

        if op.refetch {
            smallvec![Self::start_fetch(state, env)]
        } else {
            smallvec![Effect::None]
        }
    }
}

impl<B: CartApi + Clone + 'static> Reducer for CartReducer<B> {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment<B>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════
            // Commands
            // ═══════════════════════════════════════════════════════════
            CartAction::FetchItems => smallvec![Self::start_fetch(state, env)],

            CartAction::AddItem {
                product_id,
                quantity,
                variant,
            } => Self::add_item(state, env, product_id, quantity, variant),

            CartAction::UpdateItem {
                cart_item_id,
                quantity,
            } => Self::update_item(state, env, cart_item_id, quantity),

            CartAction::RemoveItem { cart_item_id } => Self::remove_item(state, env, cart_item_id),

            CartAction::ClearAll => Self::clear_all(state, env),

            CartAction::ClearError => {
                state.error = None;
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Results
            // ═══════════════════════════════════════════════════════════
            CartAction::ItemsFetched { seq, result } => {
                Self::apply_fetched(state, seq, result);
                smallvec![Effect::None]
            },

            CartAction::ItemAdded {
                product_id,
                seq,
                result,
            } => Self::item_added(state, env, product_id, seq, result),

            CartAction::ItemUpdated {
                cart_item_id,
                seq,
                result,
            } => Self::settle_line(state, env, cart_item_id, seq, result.map(Some)),

            CartAction::ItemRemoved {
                cart_item_id,
                seq,
                result,
            } => Self::settle_line(state, env, cart_item_id, seq, result.map(|()| None)),

            CartAction::Cleared { seq, result } => Self::cleared(state, env, seq, result),
        }
    }
}
