//! Cart data store.
//!
//! Holds the customer's cart lines and summary and mutates them
//! optimistically: every command updates state immediately, issues one
//! backend request, and on failure rolls back to the last server-confirmed
//! snapshot.
//!
//! # Per-entity serialization
//!
//! At most one request per cart line (and per product for adds) is in
//! flight. Intents issued meanwhile collapse into a single queued intent
//! (latest wins) which is sent when the in-flight request settles. Every
//! request carries a sequence number and responses for anything but the
//! current in-flight sequence are discarded.
//!
//! ```text
//! UpdateItem(3) ──► PATCH q=3 ───────────────► ItemUpdated(seq 1) ──► PATCH q=5 ──► ItemUpdated(seq 2)
//! UpdateItem(4) ──► queued(4)                   │
//! UpdateItem(5) ──► queued(5) ◄── replaces 4 ───┘
//! ```

use crate::types::{
    AddToCartRequest, CartItemId, CartLineItem, CartSnapshot, CartSummary, ProductId,
};
use std::collections::{HashMap, HashSet};

pub mod reducer;
pub mod view;

pub use reducer::CartReducer;
pub use view::{MerchantGroup, checkout_items, merchant_groups};

/// Dependencies of the cart reducer.
#[derive(Debug, Clone)]
pub struct CartEnvironment<B> {
    /// Cart backend.
    pub api: B,
}

impl<B> CartEnvironment<B> {
    /// Create a cart environment.
    #[must_use]
    pub const fn new(api: B) -> Self {
        Self { api }
    }
}

/// Cart actions: commands from the UI and results of backend requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    // Commands
    /// Load the cart from the backend.
    FetchItems,
    /// Add units of a product (optionally a specific variant).
    AddItem {
        /// Product to add.
        product_id: ProductId,
        /// Units to add.
        quantity: u32,
        /// Variant label.
        variant: Option<String>,
    },
    /// Set a line's quantity. Zero or less removes the line.
    UpdateItem {
        /// Line to change.
        cart_item_id: CartItemId,
        /// Desired quantity.
        quantity: i64,
    },
    /// Remove a line.
    RemoveItem {
        /// Line to remove.
        cart_item_id: CartItemId,
    },
    /// Empty the cart.
    ClearAll,
    /// Dismiss the current error.
    ClearError,

    // Results
    /// `GET /cart` settled.
    ItemsFetched {
        /// Fetch sequence.
        seq: u64,
        /// Snapshot or error message.
        result: Result<CartSnapshot, String>,
    },
    /// `POST /cart/items` settled.
    ItemAdded {
        /// Product the request was for.
        product_id: ProductId,
        /// Request sequence.
        seq: u64,
        /// Resulting line or error message.
        result: Result<CartLineItem, String>,
    },
    /// `PATCH /cart/items/{id}` settled.
    ItemUpdated {
        /// Line the request was for.
        cart_item_id: CartItemId,
        /// Request sequence.
        seq: u64,
        /// Resulting line or error message.
        result: Result<CartLineItem, String>,
    },
    /// `DELETE /cart/items/{id}` settled.
    ItemRemoved {
        /// Line the request was for.
        cart_item_id: CartItemId,
        /// Request sequence.
        seq: u64,
        /// Error message on failure.
        result: Result<(), String>,
    },
    /// `DELETE /cart` settled.
    Cleared {
        /// Request sequence.
        seq: u64,
        /// Error message on failure.
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineIntent {
    Quantity(u32),
    Remove,
}

/// Book-keeping for a line with a request in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineOp {
    pub(crate) seq: u64,
    pub(crate) in_flight: LineIntent,
    pub(crate) queued: Option<LineIntent>,
    /// Last server-confirmed line; `None` once the server removed it.
    pub(crate) confirmed: Option<CartLineItem>,
    pub(crate) position: usize,
    pub(crate) issued: u32,
}

impl LineOp {
    pub(crate) fn latest(&self) -> LineIntent {
        self.queued.unwrap_or(self.in_flight)
    }

    pub(crate) fn satisfied_by_confirmed(&self, intent: LineIntent) -> bool {
        match (intent, &self.confirmed) {
            (LineIntent::Quantity(q), Some(line)) => line.quantity() == q,
            (LineIntent::Remove, None) => true,
            _ => false,
        }
    }
}

/// Book-keeping for a product with an add request in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AddOp {
    pub(crate) seq: u64,
    pub(crate) in_flight: AddToCartRequest,
    pub(crate) queued: Vec<AddToCartRequest>,
    /// Server-confirmed lines of the product with their positions.
    pub(crate) confirmed: Vec<(usize, CartLineItem)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClearOp {
    pub(crate) seq: u64,
    pub(crate) snapshot: Vec<CartLineItem>,
    pub(crate) refetch: bool,
}

/// Cart state.
///
/// Lines and summary are only changed by [`CartReducer`]; the summary is
/// recomputed after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    lines: Vec<CartLineItem>,
    summary: CartSummary,
    /// A fetch is in flight.
    pub loading: bool,
    /// The cart has been fetched at least once.
    pub loaded: bool,
    /// Last error, for display.
    pub error: Option<String>,
    /// Products with an add in flight.
    pub add_loading: HashSet<ProductId>,
    /// Lines with a quantity change pending.
    pub update_loading: HashSet<CartItemId>,
    /// Lines with a removal pending.
    pub remove_loading: HashSet<CartItemId>,

    pub(crate) line_ops: HashMap<CartItemId, LineOp>,
    pub(crate) add_ops: HashMap<ProductId, AddOp>,
    pub(crate) clear_op: Option<ClearOp>,
    pub(crate) fetch_seq: u64,
    pub(crate) last_seq: u64,
}

impl CartState {
    /// A loaded cart holding `lines`.
    #[must_use]
    pub fn with_lines(lines: Vec<CartLineItem>) -> Self {
        let mut state = Self {
            lines: lines.into_iter().map(CartLineItem::normalized).collect(),
            loaded: true,
            ..Self::default()
        };
        state.recompute();
        state
    }

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Totals over all lines.
    #[must_use]
    pub const fn summary(&self) -> &CartSummary {
        &self.summary
    }

    /// Look up a line by id.
    #[must_use]
    pub fn line(&self, id: &CartItemId) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| &line.id == id)
    }

    /// Look up the line holding a product and variant.
    #[must_use]
    pub fn line_for_product(
        &self,
        product_id: &ProductId,
        variant: Option<&str>,
    ) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| line.matches(product_id, variant))
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any request is pending.
    #[must_use]
    pub fn has_pending_requests(&self) -> bool {
        self.loading
            || self.clear_op.is_some()
            || !self.line_ops.is_empty()
            || !self.add_ops.is_empty()
    }

    pub(crate) fn recompute(&mut self) {
        self.summary = CartSummary::from_items(&self.lines);
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    pub(crate) fn position(&self, id: &CartItemId) -> Option<usize> {
        self.lines.iter().position(|line| &line.id == id)
    }

    pub(crate) fn lines_mut(&mut self) -> &mut Vec<CartLineItem> {
        &mut self.lines
    }

    pub(crate) fn refresh_line_flags(&mut self, id: &CartItemId) {
        self.update_loading.remove(id);
        self.remove_loading.remove(id);
        match self.line_ops.get(id).map(LineOp::latest) {
            Some(LineIntent::Quantity(_)) => {
                self.update_loading.insert(id.clone());
            },
            Some(LineIntent::Remove) => {
                self.remove_loading.insert(id.clone());
            },
            None => {},
        }
    }
}
