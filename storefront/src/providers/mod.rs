//! Storefront providers.
//!
//! Traits for every external dependency the reducers need: the backend
//! REST API, the signed-in customer, the payment gateway hand-off,
//! session-scoped storage and receipt delivery.
//!
//! Providers are interfaces. Reducers capture a clone of the provider in an
//! `Effect::Future`; the store runtime executes it and feeds the result back
//! as an action. [`HttpStorefrontApi`] is the production backend client and
//! `crate::mocks` holds in-memory versions for tests.

pub mod cart;
pub mod gateway;
pub mod http;
pub mod orders;
pub mod payments;
pub mod receipt;
pub mod session;
pub mod storage;
pub mod wishlist;

pub use cart::CartApi;
pub use gateway::GatewayBridge;
pub use http::HttpStorefrontApi;
pub use orders::OrderApi;
pub use payments::PaymentApi;
pub use receipt::ReceiptSink;
pub use session::CustomerSession;
pub use storage::PendingOrderStore;
pub use wishlist::WishlistApi;
