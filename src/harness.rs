//! The benchmark harness driving the containers
//!
//! A run spawns a fixed number of Worker-Threads against one shared
//! container, each performing a configured number of operations plus a final
//! drain, and measures the wall-clock time of the whole parallel region.
//! The conservation counts (how many Elements went in, came out and were
//! left over) are reported alongside the timing so a run can double as a
//! smoke test.

use std::thread;
use std::time::{Duration, Instant};

use crate::queues::Fifo;
use crate::stacks::Lifo;

/// How the operations of a single Worker are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// First all Insertions, then a full drain
    Phased,
    /// Alternating single Insert/Remove pairs, then a full drain
    Interleaved,
}

/// The explicit Configuration of one benchmark run
///
/// This gets passed down into every Worker-Closure, there is no process-wide
/// mutable state involved
#[derive(Debug, Clone)]
pub struct Config {
    /// The number of Worker-Threads to spawn
    pub threads: usize,
    /// The number of Insert operations every Worker performs
    pub ops_per_thread: usize,
    /// The shape of every Worker's operation sequence
    pub workload: Workload,
}

/// The outcome of one benchmark run
#[derive(Debug)]
pub struct Report {
    /// Wall-clock time of the parallel region, from before the first spawn
    /// until after the last join
    pub elapsed: Duration,
    /// Total number of Elements inserted by the Workers
    pub pushed: usize,
    /// Total number of Elements the Workers got back out
    pub popped: usize,
    /// Elements left over after the Workers finished, drained afterwards
    pub drained: usize,
}

impl Report {
    /// Checks that no Element was lost or duplicated: everything that was
    /// inserted came out exactly once, either during the run or in the final
    /// drain
    pub fn conserved(&self) -> bool {
        self.pushed == self.popped + self.drained
    }
}

/// Runs the configured workload against the given Stack
///
/// The Values are chosen distinct across all Workers, so a Report with
/// matching counts implies no Element was duplicated or dropped
pub fn run_lifo<S>(stack: &S, config: &Config) -> Report
where
    S: Lifo<usize> + Sync,
{
    let start = Instant::now();

    let counts: Vec<(usize, usize)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|worker| {
                scope.spawn(move || {
                    let mut pushed = 0;
                    let mut popped = 0;
                    let base = worker * config.ops_per_thread;

                    match config.workload {
                        Workload::Phased => {
                            for i in 0..config.ops_per_thread {
                                stack.push(base + i);
                                pushed += 1;
                            }
                        }
                        Workload::Interleaved => {
                            for i in 0..config.ops_per_thread {
                                stack.push(base + i);
                                pushed += 1;
                                if stack.pop().is_some() {
                                    popped += 1;
                                }
                            }
                        }
                    }

                    // Post-run drain, until this Worker observes empty
                    while stack.pop().is_some() {
                        popped += 1;
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

    let elapsed = start.elapsed();

    // Workers may race each other into observing "empty" while another one
    // still holds Elements, whatever is left gets accounted for here
    let mut drained = 0;
    while stack.pop().is_some() {
        drained += 1;
    }

    let (pushed, popped) = sum_counts(counts);
    Report {
        elapsed,
        pushed,
        popped,
        drained,
    }
}

/// Runs the configured workload against the given Queue
pub fn run_fifo<Q>(queue: &Q, config: &Config) -> Report
where
    Q: Fifo<usize> + Sync,
{
    let start = Instant::now();

    let counts: Vec<(usize, usize)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|worker| {
                scope.spawn(move || {
                    let mut pushed = 0;
                    let mut popped = 0;
                    let base = worker * config.ops_per_thread;

                    match config.workload {
                        Workload::Phased => {
                            for i in 0..config.ops_per_thread {
                                queue.enqueue(base + i);
                                pushed += 1;
                            }
                        }
                        Workload::Interleaved => {
                            for i in 0..config.ops_per_thread {
                                queue.enqueue(base + i);
                                pushed += 1;
                                if queue.dequeue().is_some() {
                                    popped += 1;
                                }
                            }
                        }
                    }

                    while queue.dequeue().is_some() {
                        popped += 1;
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

    let elapsed = start.elapsed();

    let mut drained = 0;
    while queue.dequeue().is_some() {
        drained += 1;
    }

    let (pushed, popped) = sum_counts(counts);
    Report {
        elapsed,
        pushed,
        popped,
        drained,
    }
}

fn sum_counts(counts: Vec<(usize, usize)>) -> (usize, usize) {
    counts
        .into_iter()
        .fold((0, 0), |(pushed, popped), (p, o)| (pushed + p, popped + o))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::basket::BasketQueue;
    use crate::queues::michael_scott::MsQueue;
    use crate::stacks::treiber::TreiberStack;

    #[test]
    fn treiber_phased_conserves() {
        let stack = TreiberStack::new();
        let config = Config {
            threads: 4,
            ops_per_thread: 1000,
            workload: Workload::Phased,
        };

        let report = run_lifo(&stack, &config);

        assert_eq!(4000, report.pushed);
        assert_eq!(4000, report.popped + report.drained);
        assert!(report.conserved());
        assert!(stack.is_empty());
    }

    #[test]
    fn ms_interleaved_conserves() {
        let queue = MsQueue::new();
        let config = Config {
            threads: 4,
            ops_per_thread: 1000,
            workload: Workload::Interleaved,
        };

        let report = run_fifo(&queue, &config);

        assert_eq!(4000, report.pushed);
        assert!(report.conserved());
        assert!(queue.is_empty());
    }

    #[test]
    fn basket_phased_conserves() {
        let queue = BasketQueue::new();
        let config = Config {
            threads: 4,
            ops_per_thread: 1000,
            workload: Workload::Phased,
        };

        let report = run_fifo(&queue, &config);

        assert!(report.conserved());
    }

    #[test]
    fn single_thread_run() {
        let stack = TreiberStack::new();
        let config = Config {
            threads: 1,
            ops_per_thread: 100,
            workload: Workload::Phased,
        };

        let report = run_lifo(&stack, &config);

        assert_eq!(100, report.pushed);
        assert_eq!(100, report.popped);
        assert_eq!(0, report.drained);
    }
}
