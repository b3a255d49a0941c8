//! # Doko Testing
//!
//! Testing utilities for reducers built on `doko-core`.
//!
//! This crate provides:
//! - A fixed clock for deterministic timestamps
//! - [`ReducerTest`], a Given-When-Then harness for a single reducer call
//! - [`effects::collect_actions`], which runs an effect tree without a store
//!   and returns the actions it produced
//! - Assertion helpers for effect lists
//!
//! ## Example
//!
//! ```ignore
//! use doko_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(CartReducer::new())
//!     .with_env(env)
//!     .given_state(cart_with_one_line())
//!     .when_action(CartAction::UpdateItem { cart_item_id, quantity: 0 })
//!     .then_state(|s| assert!(s.lines().is_empty()))
//!     .then_effects(assertions::assert_has_future_effect)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use doko_core::environment::Clock;

mod reducer_test;

pub mod effects;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of core Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use doko_testing::mocks::FixedClock;
    /// use doko_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a `tracing` subscriber that writes to the test harness
    ///
    /// Honors `RUST_LOG`; safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::init_test_tracing;
pub use mocks::{FixedClock, test_clock};
