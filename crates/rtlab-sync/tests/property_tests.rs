//! Model-based property tests for semaphores and handoffs.

use proptest::prelude::*;
use quickcheck_macros::quickcheck;
use rtlab_sync::prelude::*;
use std::collections::VecDeque;

/// Single-threaded operation on a semaphore.
#[derive(Debug, Clone, Copy)]
enum Op {
    Release,
    TryAcquire,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Release), Just(Op::TryAcquire)]
}

proptest! {
    #[test]
    fn prop_count_tracks_model(
        capacity in 1u32..8,
        initial_ratio in 0.0f64..=1.0,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let initial = ((f64::from(capacity)) * initial_ratio).floor() as u32;
        let sem = Semaphore::counting("model", initial, capacity)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut model = initial;

        for op in ops {
            match op {
                Op::Release => {
                    let outcome = sem.release();
                    if model < capacity {
                        model += 1;
                        prop_assert_eq!(outcome, Release::Incremented);
                    } else {
                        prop_assert_eq!(outcome, Release::Saturated);
                    }
                }
                Op::TryAcquire => {
                    let taken = sem.try_acquire();
                    prop_assert_eq!(taken, model > 0);
                    if taken {
                        model -= 1;
                    }
                }
            }
            prop_assert!(sem.count() <= capacity);
            prop_assert_eq!(sem.count(), model);
        }
    }

    #[test]
    fn prop_queued_handoff_matches_fifo_model(
        capacity in 1u32..6,
        ops in prop::collection::vec(prop::option::of(any::<u16>()), 0..200),
    ) {
        let link = Handoff::queued("model", capacity, None)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut model = VecDeque::new();

        // Some(v) publishes v, None receives.
        for op in ops {
            match op {
                Some(value) => {
                    let outcome = link.publish(value);
                    if model.len() < capacity as usize {
                        model.push_back(value);
                        prop_assert_eq!(outcome, Ok(Publish::Delivered));
                    } else {
                        prop_assert_eq!(outcome, Err(SyncError::Full { capacity }));
                    }
                }
                None => {
                    prop_assert_eq!(link.try_receive(), model.pop_front());
                }
            }
            prop_assert_eq!(link.pending(), model.len());
        }
    }
}

#[quickcheck]
fn latest_handoff_yields_last_published(values: Vec<u32>) -> bool {
    let link = Handoff::latest("latest", None);
    for &value in &values {
        if link.publish(value).is_err() {
            return false;
        }
    }
    link.try_receive() == values.last().copied() && link.try_receive().is_none()
}

#[quickcheck]
fn permits_always_return_units(holds: u8) -> bool {
    let capacity = u32::from(holds % 8) + 1;
    let Ok(sem) = Semaphore::counting("permits", capacity, capacity) else {
        return false;
    };
    {
        let mut permits = Vec::new();
        for _ in 0..capacity {
            match sem.acquire_guard() {
                Ok(permit) => permits.push(permit),
                Err(_) => return false,
            }
        }
        if sem.count() != 0 {
            return false;
        }
    }
    sem.count() == capacity
}
