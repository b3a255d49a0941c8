//! Wishlist data store.
//!
//! A set of saved products keyed by product id. `status` drives the heart
//! icons across the storefront and always shows the customer's latest
//! intent; `items` holds the server's product data for the wishlist page.
//!
//! Membership changes are serialized per product like cart lines: one
//! request in flight, one queued desired membership. A queued desire is only
//! sent if it differs from what the server confirmed, so an even number of
//! rapid toggles settles back where it started.

use crate::types::{ProductId, WishlistItem};
use std::collections::{HashMap, HashSet};

pub mod reducer;

pub use reducer::WishlistReducer;

/// Dependencies of the wishlist reducer.
#[derive(Debug, Clone)]
pub struct WishlistEnvironment<B> {
    /// Wishlist backend.
    pub api: B,
}

impl<B> WishlistEnvironment<B> {
    /// Create a wishlist environment.
    #[must_use]
    pub const fn new(api: B) -> Self {
        Self { api }
    }
}

/// Wishlist actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistAction {
    // Commands
    /// Load the wishlist.
    FetchItems,
    /// Save a product.
    AddItem {
        /// Product to save.
        product_id: ProductId,
    },
    /// Unsave a product.
    RemoveItem {
        /// Product to unsave.
        product_id: ProductId,
    },
    /// Flip a product's saved state.
    Toggle {
        /// Product to flip.
        product_id: ProductId,
    },
    /// Unsave everything.
    ClearAll,
    /// Dismiss the current error.
    ClearError,
    /// Ask the backend whether a product is saved.
    CheckStatus {
        /// Product to check.
        product_id: ProductId,
    },

    // Results
    /// `GET /wishlist` settled.
    ItemsFetched {
        /// Fetch sequence.
        seq: u64,
        /// Saved items or error message.
        result: Result<Vec<WishlistItem>, String>,
    },
    /// An add (`Some(item)`) or remove (`None`) settled.
    MembershipSettled {
        /// Product the request was for.
        product_id: ProductId,
        /// Request sequence.
        seq: u64,
        /// Confirmed membership or error message.
        result: Result<Option<WishlistItem>, String>,
    },
    /// `GET /wishlist/check/{id}` settled.
    StatusChecked {
        /// Product checked.
        product_id: ProductId,
        /// Request sequence.
        seq: u64,
        /// Membership or error message.
        result: Result<bool, String>,
    },
    /// `DELETE /wishlist` settled.
    Cleared {
        /// Request sequence.
        seq: u64,
        /// Error message on failure.
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MembershipOp {
    pub(crate) seq: u64,
    pub(crate) in_flight: bool,
    pub(crate) queued: Option<bool>,
    pub(crate) confirmed: bool,
    pub(crate) confirmed_item: Option<WishlistItem>,
    pub(crate) position: usize,
}

impl MembershipOp {
    pub(crate) fn latest(&self) -> bool {
        self.queued.unwrap_or(self.in_flight)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClearOp {
    pub(crate) seq: u64,
    pub(crate) items: Vec<WishlistItem>,
    pub(crate) status: HashMap<ProductId, bool>,
    pub(crate) refetch: bool,
}

/// Wishlist state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WishlistState {
    items: Vec<WishlistItem>,
    /// Saved state per product, as shown to the customer.
    pub status: HashMap<ProductId, bool>,
    /// A fetch is in flight.
    pub loading: bool,
    /// The wishlist has been fetched at least once.
    pub loaded: bool,
    /// Last error, for display.
    pub error: Option<String>,
    /// Products being saved.
    pub add_loading: HashSet<ProductId>,
    /// Products being unsaved.
    pub remove_loading: HashSet<ProductId>,

    pub(crate) ops: HashMap<ProductId, MembershipOp>,
    pub(crate) checks: HashMap<ProductId, u64>,
    pub(crate) clear_op: Option<ClearOp>,
    pub(crate) fetch_seq: u64,
    pub(crate) last_seq: u64,
}

impl WishlistState {
    /// A loaded wishlist holding `items`.
    #[must_use]
    pub fn with_items(items: Vec<WishlistItem>) -> Self {
        let status = items
            .iter()
            .map(|item| (item.product_id.clone(), true))
            .collect();
        Self {
            items,
            status,
            loaded: true,
            ..Self::default()
        }
    }

    /// Saved items with server data.
    #[must_use]
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    /// Whether a product shows as saved.
    #[must_use]
    pub fn is_saved(&self, product_id: &ProductId) -> bool {
        self.status.get(product_id).copied().unwrap_or(false)
    }

    /// Number of saved items with server data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    pub(crate) fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| &item.product_id == product_id)
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<WishlistItem> {
        &mut self.items
    }

    /// Show `saved` for a product, dropping its item when unsaved.
    pub(crate) fn show(&mut self, product_id: &ProductId, saved: bool) {
        self.status.insert(product_id.clone(), saved);
        if !saved {
            self.items.retain(|item| &item.product_id != product_id);
        }
    }

    /// Put a server item back at (or near) its position.
    pub(crate) fn place_item(&mut self, item: WishlistItem, position: usize) {
        match self.position(&item.product_id) {
            Some(index) => self.items[index] = item,
            None => {
                let at = position.min(self.items.len());
                self.items.insert(at, item);
            },
        }
    }

    pub(crate) fn refresh_flags(&mut self, product_id: &ProductId) {
        self.add_loading.remove(product_id);
        self.remove_loading.remove(product_id);
        match self.ops.get(product_id).map(MembershipOp::latest) {
            Some(true) => {
                self.add_loading.insert(product_id.clone());
            },
            Some(false) => {
                self.remove_loading.insert(product_id.clone());
            },
            None => {},
        }
    }
}
