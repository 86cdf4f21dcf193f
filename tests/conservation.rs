//! Conservation checks across all the containers: every Value that went in
//! comes out exactly once, no matter how many Threads are involved

use std::collections::HashSet;
use std::thread;

use rand::Rng;

use contend::queues::basket::BasketQueue;
use contend::queues::michael_scott::MsQueue;
use contend::queues::sgl::SglQueue;
use contend::queues::Fifo;
use contend::stacks::elimination::ElimStack;
use contend::stacks::sgl::SglStack;
use contend::stacks::treiber::TreiberStack;
use contend::stacks::Lifo;

const THREADS: usize = 4;
const OPS: usize = 1000;

/// Every Worker pushes its own distinct range and then pops until it
/// collected as many Values as it pushed. Afterwards every pushed Value has
/// to show up exactly once across all Workers.
fn check_lifo<S>(stack: S)
where
    S: Lifo<usize> + Sync,
{
    let collected: Vec<Vec<usize>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let stack = &stack;
                scope.spawn(move || {
                    let base = worker * OPS;
                    for i in 0..OPS {
                        stack.push(base + i);
                    }

                    let mut got = Vec::with_capacity(OPS);
                    while got.len() < OPS {
                        if let Some(value) = stack.pop() {
                            got.push(value);
                        }
                    }
                    got
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("no Worker panics"))
            .collect()
    });

    let mut seen = HashSet::new();
    for values in collected {
        for value in values {
            assert!(value < THREADS * OPS, "popped a Value that was never pushed");
            assert!(seen.insert(value), "Value {} was popped twice", value);
        }
    }
    assert_eq!(THREADS * OPS, seen.len(), "some Values were lost");

    assert_eq!(None, stack.pop());
    assert!(stack.is_empty());
    assert!(stack.is_empty());
}

fn check_fifo<Q>(queue: Q)
where
    Q: Fifo<usize> + Sync,
{
    let collected: Vec<Vec<usize>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let queue = &queue;
                scope.spawn(move || {
                    let base = worker * OPS;
                    for i in 0..OPS {
                        queue.enqueue(base + i);
                    }

                    let mut got = Vec::with_capacity(OPS);
                    while got.len() < OPS {
                        if let Some(value) = queue.dequeue() {
                            got.push(value);
                        }
                    }
                    got
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("no Worker panics"))
            .collect()
    });

    let mut seen = HashSet::new();
    for values in collected {
        for value in values {
            assert!(
                value < THREADS * OPS,
                "dequeued a Value that was never enqueued"
            );
            assert!(seen.insert(value), "Value {} was dequeued twice", value);
        }
    }
    assert_eq!(THREADS * OPS, seen.len(), "some Values were lost");

    assert_eq!(None, queue.dequeue());
    assert!(queue.is_empty());
    assert!(queue.is_empty());
}

#[test]
fn treiber_phased() {
    check_lifo(TreiberStack::new());
}

#[test]
fn sgl_stack_phased() {
    check_lifo(SglStack::new());
}

#[test]
fn elim_treiber_phased() {
    check_lifo(ElimStack::<usize, TreiberStack<usize>>::default());
}

#[test]
fn elim_sgl_phased() {
    check_lifo(ElimStack::<usize, SglStack<usize>>::default());
}

#[test]
fn ms_phased() {
    check_fifo(MsQueue::new());
}

#[test]
fn basket_phased() {
    check_fifo(BasketQueue::new());
}

#[test]
fn sgl_queue_phased() {
    check_fifo(SglQueue::new());
}

/// A randomized mix of operations instead of the fixed phases, the counts
/// still have to add up afterwards
#[test]
fn treiber_random_mix() {
    let stack = TreiberStack::new();

    let counts: Vec<(usize, usize)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let stack = &stack;
                scope.spawn(move || {
                    let mut rng = rand::thread_rng();
                    let mut pushed = 0;
                    let mut popped = 0;

                    for i in 0..OPS {
                        if rng.gen::<bool>() {
                            stack.push(worker * OPS + i);
                            pushed += 1;
                        } else if stack.pop().is_some() {
                            popped += 1;
                        }
                    }
                    (pushed, popped)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("no Worker panics"))
            .collect()
    });

    let pushed: usize = counts.iter().map(|(p, _)| p).sum();
    let mut popped: usize = counts.iter().map(|(_, o)| o).sum();

    while stack.pop().is_some() {
        popped += 1;
    }
    assert_eq!(pushed, popped);
    assert!(stack.is_empty());
}
