//! Mock provider implementations for testing.
//!
//! In-memory implementations of every provider trait, for unit and
//! integration tests and for running the reducers without a backend.

pub mod backend;
pub mod gateway;
pub mod receipt;
pub mod session;
pub mod storage;

pub use backend::{CatalogProduct, MockBackend, Operation};
pub use gateway::RecordingGateway;
pub use receipt::RecordingReceiptSink;
pub use session::MockCustomerSession;
pub use storage::InMemoryPendingOrders;
