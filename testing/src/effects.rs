//! Running effect trees outside the store
//!
//! Reducer tests usually stop at "an effect was returned". These helpers go
//! one step further: they execute the effects (futures awaited in order,
//! delays resolved immediately) and return the actions that would have been
//! fed back, without reducing them.

use doko_core::effect::Effect;
use std::collections::VecDeque;

/// Execute effects depth-first and collect the produced actions
///
/// `Parallel` children run in declaration order so results are deterministic.
pub async fn collect_actions<A>(effects: impl IntoIterator<Item = Effect<A>>) -> Vec<A> {
    let mut pending: VecDeque<Effect<A>> = effects.into_iter().collect();
    let mut actions = Vec::new();

    while let Some(effect) = pending.pop_front() {
        match effect {
            Effect::None => {},
            Effect::Parallel(children) | Effect::Sequential(children) => {
                for child in children.into_iter().rev() {
                    pending.push_front(child);
                }
            },
            Effect::Delay { action, .. } => actions.push(*action),
            Effect::Future(fut) => {
                if let Some(action) = fut.await {
                    actions.push(action);
                }
            },
        }
    }

    actions
}

/// Blocking variant of [`collect_actions`] for synchronous tests
///
/// Effects that need a Tokio runtime (timers, spawned I/O) must use the
/// async version inside `#[tokio::test]`.
pub fn collect_actions_blocking<A>(effects: impl IntoIterator<Item = Effect<A>>) -> Vec<A> {
    futures::executor::block_on(collect_actions(effects))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Step {
        A,
        B,
        C,
    }

    #[test]
    fn collects_in_declaration_order() {
        let effects = vec![
            Effect::chain(vec![
                Effect::Future(Box::pin(async { Some(Step::A) })),
                Effect::Future(Box::pin(async { None })),
            ]),
            Effect::merge(vec![
                Effect::Delay {
                    duration: std::time::Duration::from_secs(60),
                    action: Box::new(Step::B),
                },
                Effect::Future(Box::pin(async { Some(Step::C) })),
            ]),
        ];

        assert_eq!(collect_actions_blocking(effects), vec![Step::A, Step::B, Step::C]);
    }

    #[tokio::test]
    async fn runs_timer_based_futures_in_tokio() {
        let effects = vec![Effect::Future(Box::pin(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            Some(Step::A)
        }))];

        assert_eq!(collect_actions(effects).await, vec![Step::A]);
    }
}
