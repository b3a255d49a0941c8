//! # Doko Storefront
//!
//! Customer-side cart, wishlist and checkout logic for the Doko
//! multi-merchant storefront, written as reducers for the `doko-runtime`
//! store.
//!
//! ## Features
//!
//! - **Optimistic cart and wishlist**: state changes immediately, requests
//!   are serialized per line / product, failures roll back
//! - **Checkout state machine**: Address → Payment → Confirmation, with each
//!   stage carrying the evidence that allows it
//! - **Gateway bridge**: signed payment forms become plain [`FormPost`]
//!   descriptions; submission is a pluggable provider
//! - **Testable**: every backend and browser concern is a trait with an
//!   in-memory mock (feature `test-utils`)
//!
//! ## Architecture
//!
//! ```text
//! UI ── StorefrontAction ──► StorefrontReducer ──► (State, Effects)
//!                               │   │   │                 │
//!                            cart wishlist checkout   providers (HTTP, gateway, storage)
//!                                                         │
//!            ◄──────────── result actions ────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use doko_storefront::*;
//! use doko_runtime::Store;
//!
//! let api = HttpStorefrontApi::from_env()?;
//! let env = StorefrontEnvironment::new(api, session, gateway, storage, receipts,
//!     Arc::new(SystemClock), StorefrontConfig::from_env()?);
//! let store = Store::new(StorefrontState::default(), StorefrontReducer::new(), env);
//!
//! store.send(StorefrontAction::Load).await?;
//! store.send(StorefrontAction::BeginCheckout { merchant_id }).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod app;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod providers;
pub mod receipt;
pub mod types;
pub mod wishlist;

// Mock providers for tests and local runs
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use app::{StorefrontAction, StorefrontEnvironment, StorefrontReducer, StorefrontState};
pub use cart::{CartAction, CartReducer, CartState};
pub use checkout::{CheckoutAction, CheckoutReducer, CheckoutStage, CheckoutState};
pub use config::StorefrontConfig;
pub use error::{Result, StorefrontError};
pub use gateway::{FormPost, GatewayReturn, SubmissionMode};
pub use providers::HttpStorefrontApi;
pub use wishlist::{WishlistAction, WishlistReducer, WishlistState};
