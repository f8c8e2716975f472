//! Property-based tests for the stacks using proptest
//!
//! Single-threaded operation sequences are replayed against both stacks and a
//! `Vec` model; every call must agree.

use super::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Pop,
    PushBatch(Vec<i32>),
    PopBatch(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<i32>().prop_map(Op::Push),
        3 => Just(Op::Pop),
        1 => prop::collection::vec(any::<i32>(), 0..8).prop_map(Op::PushBatch),
        1 => (0usize..8).prop_map(Op::PopBatch),
    ]
}

/// Reference model: a `Vec` used as a stack plus a call counter
#[derive(Default)]
struct Model {
    items: Vec<i32>,
    counter: u64,
}

impl Model {
    fn push(&mut self, value: i32) {
        self.items.push(value);
        self.counter += 1;
    }

    fn pop(&mut self) -> Option<i32> {
        self.counter += 1;
        self.items.pop()
    }

    fn pop_batch(&mut self, max: usize) -> Vec<i32> {
        let mut out = Vec::new();
        for _ in 0..max {
            match self.pop() {
                Some(value) => out.push(value),
                None => break,
            }
        }
        out
    }
}

proptest! {
    #[test]
    fn test_matches_vec_model(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let lock_free = LockFreeStack::new();
        let locked = LockedStack::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Push(value) => {
                    lock_free.push(value);
                    locked.push(value);
                    model.push(value);
                }
                Op::Pop => {
                    let expected = model.pop();
                    prop_assert_eq!(lock_free.pop(), expected);
                    prop_assert_eq!(locked.pop(), expected);
                }
                Op::PushBatch(values) => {
                    lock_free.push_batch(values.iter().copied());
                    locked.push_batch(values.iter().copied());
                    for value in values {
                        model.push(value);
                    }
                }
                Op::PopBatch(max) => {
                    let expected = model.pop_batch(max);
                    prop_assert_eq!(lock_free.pop_batch(max), expected.clone());
                    prop_assert_eq!(locked.pop_batch(max), expected);
                }
            }

            prop_assert_eq!(lock_free.len(), model.items.len());
            prop_assert_eq!(locked.len(), model.items.len());
            prop_assert_eq!(lock_free.counter(), model.counter);
            prop_assert_eq!(locked.counter(), model.counter);
        }
    }

    #[test]
    fn test_metrics_sum_to_counter(ops in prop::collection::vec(prop::bool::weighted(0.6), 1..300)) {
        use crate::metrics::MetricsCollector;

        let stack = LockFreeStack::new();
        for (i, should_push) in ops.into_iter().enumerate() {
            if should_push {
                stack.push(i);
            } else {
                stack.pop();
            }
        }

        let metrics = stack.metrics();
        prop_assert_eq!(metrics.total_operations(), stack.counter());
        prop_assert_eq!(metrics.pushes - metrics.pops, stack.len() as u64);
    }

    #[test]
    fn test_pushed_values_survive_drop(values in prop::collection::vec(any::<u16>(), 0..64), pops in 0usize..64) {
        use std::sync::Arc;

        let tracked: Vec<Arc<u16>> = values.iter().copied().map(Arc::new).collect();
        {
            let stack = LockFreeStack::new();
            stack.push_batch(tracked.iter().cloned());
            let popped = stack.pop_batch(pops);
            prop_assert_eq!(popped.len(), pops.min(values.len()));
        }
        for value in &tracked {
            prop_assert_eq!(Arc::strong_count(value), 1);
        }
    }
}
