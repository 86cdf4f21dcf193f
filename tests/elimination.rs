//! Behavior of the Elimination layer under real concurrency: exchanged
//! Values have to be exact and the backing Stack has to stay consistent

use std::collections::HashSet;
use std::thread;

use contend::stacks::elimination::ElimStack;
use contend::stacks::sgl::SglStack;
use contend::stacks::treiber::TreiberStack;

const PAIRS: usize = 10_000;

/// One pure Pusher against one pure Popper. Whether a Value travels through
/// the collision slot or the backing Stack, the Popper has to receive every
/// pushed Value exactly once.
#[test]
fn paired_push_pop_exchanges_exact_values() {
    let stack: ElimStack<usize, TreiberStack<usize>> = ElimStack::default();

    let received: Vec<usize> = thread::scope(|scope| {
        let pusher = {
            let stack = &stack;
            scope.spawn(move || {
                for i in 0..PAIRS {
                    stack.push(i);
                }
            })
        };

        let popper = {
            let stack = &stack;
            scope.spawn(move || {
                let mut got = Vec::with_capacity(PAIRS);
                while got.len() < PAIRS {
                    if let Some(value) = stack.pop() {
                        got.push(value);
                    }
                }
                got
            })
        };

        pusher.join().expect("the Pusher does not panic");
        popper.join().expect("the Popper does not panic")
    });

    let distinct: HashSet<_> = received.iter().copied().collect();
    assert_eq!(PAIRS, received.len());
    assert_eq!(PAIRS, distinct.len());
    assert!(received.iter().all(|value| *value < PAIRS));

    // Everything was consumed, so neither the slot nor the backing Stack may
    // still hold Elements
    assert_eq!(None, stack.pop());
    assert!(stack.backing().is_empty());
}

/// Pushing far past the in-flight bound without any Pops: every Value has to
/// end up on the backing Stack and survive a full drain
#[test]
fn over_capacity_falls_back_to_backing() {
    let stack: ElimStack<usize, TreiberStack<usize>> = ElimStack::default();
    let count = 500;

    for i in 0..count {
        stack.push(i);
    }
    assert!(stack.fallbacks() >= count - 100);

    let mut seen = HashSet::new();
    while let Some(value) = stack.pop() {
        assert!(seen.insert(value));
    }
    assert_eq!(count, seen.len());
    assert!(stack.is_empty());
}

#[test]
fn many_pairs_leave_sgl_backing_empty() {
    let stack: ElimStack<usize, SglStack<usize>> = ElimStack::default();
    let threads = 4;

    thread::scope(|scope| {
        for _ in 0..threads {
            let stack = &stack;
            scope.spawn(move || {
                for i in 0..PAIRS {
                    stack.push(i);
                }
            });
        }
        for _ in 0..threads {
            let stack = &stack;
            scope.spawn(move || {
                let mut received = 0;
                while received < PAIRS {
                    if stack.pop().is_some() {
                        received += 1;
                    }
                }
            });
        }
    });

    assert_eq!(None, stack.pop());
    assert!(stack.backing().is_empty());
}
