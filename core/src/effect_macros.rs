//! Declarative macros for ergonomic effect construction
//!
//! Request effects in the storefront reducers are almost always "clone the
//! client, await one call, wrap the result into an action"; these macros keep
//! that pattern short.

/// Create an `Effect::Future` from an async block
///
/// The block must evaluate to `Option<Action>`.
///
/// # Example
///
/// ```rust,ignore
/// use doko_core::async_effect;
///
/// let api = env.api.clone();
/// async_effect! {
///     let result = api.fetch_cart().await.map_err(|e| e.to_string());
///     Some(CartAction::ItemsFetched { seq, result })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use doko_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(4),
///     action: CheckoutAction::DismissNotification { id }
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
