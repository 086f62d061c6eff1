//! Property tests for combinator outcomes under arbitrary completion orders.
mod common;

use common::init_test_logging;
use promise_chain::{all, first, zip3, Error, Promise, Resolver};
use proptest::prelude::*;

fn pending_inputs(count: usize) -> (Vec<Promise<usize>>, Vec<Resolver<usize>>) {
    (0..count).map(|_| Promise::pending()).unzip()
}

/// A shuffled `0..n` for some `n` in `1..24`.
fn arb_completion_order() -> impl Strategy<Value = Vec<usize>> {
    (1usize..24).prop_flat_map(|count| Just((0..count).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// `all` reports values in input order whatever order they complete in.
    #[test]
    fn all_preserves_input_order(order in arb_completion_order()) {
        init_test_logging();
        let (inputs, resolvers) = pending_inputs(order.len());
        let joined = all(inputs);
        let mut resolvers: Vec<_> = resolvers.into_iter().map(Some).collect();
        for &index in &order {
            prop_assert!(!joined.is_fulfilled());
            if let Some(resolver) = resolvers[index].take() {
                resolver.resolve(index * 10);
            }
        }
        let expected: Vec<_> = (0..order.len()).map(|i| i * 10).collect();
        prop_assert_eq!(joined.value(), Some(expected));
    }

    /// The first failure to be observed decides the outcome of `all`; later
    /// completions and failures change nothing.
    #[test]
    fn all_first_failure_wins(
        order in arb_completion_order(),
        failing in proptest::collection::vec(any::<bool>(), 24),
    ) {
        init_test_logging();
        let (inputs, resolvers) = pending_inputs(order.len());
        let joined = all(inputs);
        let mut resolvers: Vec<_> = resolvers.into_iter().map(Some).collect();
        let mut first_failure = None;
        for &index in &order {
            let Some(resolver) = resolvers[index].take() else { continue };
            if failing[index] {
                first_failure.get_or_insert(index);
                resolver.reject(Error::msg(index.to_string()));
            } else {
                resolver.resolve(index);
            }
        }
        match first_failure {
            Some(index) => {
                prop_assert!(joined.value().is_none());
                prop_assert_eq!(joined.error().map(|e| e.to_string()), Some(index.to_string()));
            }
            None => prop_assert_eq!(joined.value(), Some((0..order.len()).collect::<Vec<_>>())),
        }
    }

    /// `first` mirrors whichever input settles first, value or error.
    #[test]
    fn first_mirrors_earliest(
        order in arb_completion_order(),
        failing in proptest::collection::vec(any::<bool>(), 24),
    ) {
        init_test_logging();
        let (inputs, resolvers) = pending_inputs(order.len());
        let race = first(inputs);
        let mut resolvers: Vec<_> = resolvers.into_iter().map(Some).collect();
        for &index in &order {
            let Some(resolver) = resolvers[index].take() else { continue };
            if failing[index] {
                resolver.reject(Error::msg(index.to_string()));
            } else {
                resolver.resolve(index);
            }
        }
        let winner = order[0];
        if failing[winner] {
            prop_assert_eq!(race.error().map(|e| e.to_string()), Some(winner.to_string()));
        } else {
            prop_assert_eq!(race.value(), Some(winner));
        }
    }

    /// A three-way zip completes only once all three have completed.
    #[test]
    fn zip3_waits_for_all(order in Just(vec![0usize, 1, 2]).prop_shuffle()) {
        init_test_logging();
        let (a, ra) = Promise::<u8>::pending();
        let (b, rb) = Promise::<char>::pending();
        let (c, rc) = Promise::<String>::pending();
        let zipped = zip3(a, b, c);
        let (mut ra, mut rb, mut rc) = (Some(ra), Some(rb), Some(rc));
        for (step, index) in order.into_iter().enumerate() {
            prop_assert!(!zipped.is_fulfilled(), "settled after {} inputs", step);
            match index {
                0 => if let Some(r) = ra.take() { r.resolve(1) },
                1 => if let Some(r) = rb.take() { r.resolve('b') },
                _ => if let Some(r) = rc.take() { r.resolve(String::from("c")) },
            }
        }
        prop_assert_eq!(zipped.value(), Some((1, 'b', String::from("c"))));
    }
}
