use clap::{Parser, ValueEnum};

use contend::harness::{self, Config, Report, Workload};
use contend::queues::basket::BasketQueue;
use contend::queues::michael_scott::MsQueue;
use contend::queues::sgl::SglQueue;
use contend::stacks::elimination::ElimStack;
use contend::stacks::sgl::SglStack;
use contend::stacks::treiber::TreiberStack;

/// Benchmarks one of the concurrent containers under a configurable number
/// of Threads and operations
#[derive(Debug, Parser)]
#[command(name = "contend")]
struct Cli {
    /// Number of Worker-Threads to spawn
    #[arg(short = 't', long, default_value_t = 4)]
    threads: usize,

    /// Total number of Insert operations, split evenly across the Threads
    #[arg(short = 'l', long = "ops", default_value_t = 200_000)]
    ops: usize,

    /// Shape of every Worker's operation sequence
    #[arg(long, value_enum, default_value_t = WorkloadArg::Phased)]
    workload: WorkloadArg,

    /// The container to benchmark
    #[arg(value_enum)]
    container: Container,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WorkloadArg {
    /// All Insertions first, then a full drain
    Phased,
    /// Alternating Insert/Remove pairs
    Interleaved,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Container {
    /// Mutex-guarded Vec Stack
    SglStack,
    /// Mutex-guarded VecDeque Queue
    SglQueue,
    /// Lock-free Treiber-Stack
    Treiber,
    /// Lock-free Michael-Scott Queue
    Ms,
    /// Lock-free Basket-Queue
    Basket,
    /// Elimination layer over the Treiber-Stack
    ElimTreiber,
    /// Elimination layer over the SGL-Stack
    ElimSgl,
}

fn main() {
    let cli = Cli::parse();

    let threads = cli.threads.max(1);
    let config = Config {
        threads,
        // Proportional across the sum of all Threads, like `ops` describes
        ops_per_thread: cli.ops / threads,
        workload: match cli.workload {
            WorkloadArg::Phased => Workload::Phased,
            WorkloadArg::Interleaved => Workload::Interleaved,
        },
    };

    let report = match cli.container {
        Container::SglStack => harness::run_lifo(&SglStack::new(), &config),
        Container::SglQueue => harness::run_fifo(&SglQueue::new(), &config),
        Container::Treiber => harness::run_lifo(&TreiberStack::new(), &config),
        Container::Ms => harness::run_fifo(&MsQueue::new(), &config),
        Container::Basket => harness::run_fifo(&BasketQueue::new(), &config),
        Container::ElimTreiber => {
            let stack: ElimStack<usize, TreiberStack<usize>> = ElimStack::default();
            let report = harness::run_lifo(&stack, &config);
            println!("Fallbacks: {}", stack.fallbacks());
            report
        }
        Container::ElimSgl => {
            let stack: ElimStack<usize, SglStack<usize>> = ElimStack::default();
            let report = harness::run_lifo(&stack, &config);
            println!("Fallbacks: {}", stack.fallbacks());
            report
        }
    };

    print_report(&report);

    if !report.conserved() {
        eprintln!(
            "Conservation violated: {} pushed, but {} popped and {} drained",
            report.pushed, report.popped, report.drained
        );
        std::process::exit(1);
    }
}

fn print_report(report: &Report) {
    println!("Elapsed (ns): {}", report.elapsed.as_nanos());
    println!("Elapsed (s): {}", report.elapsed.as_secs_f64());
    println!(
        "Pushed: {} / Popped: {} / Drained: {}",
        report.pushed, report.popped, report.drained
    );
}
