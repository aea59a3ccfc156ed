//! busybee CLI: run a simulated workload against the tracker and wait for
//! it to go idle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use busybee::config::Config;
use busybee::idling::{BusyBeeIdlingResource, IdleWaitConfig, wait_for_idle};
use busybee::singleton::build_tracker;
use busybee::telemetry::{TelemetryConfig, init_telemetry};
use busybee::{BusyBee, BusyGuard, Category, Executor, ExecutorWrapper, Operation};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "busybee", about = "Track outstanding async work and wait for idle")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulated workload and wait for the tracker to go idle
    Demo {
        /// Number of simulated async operations
        #[arg(long, default_value_t = 12)]
        operations: u64,
        /// Number of simulated blocking jobs run through a tracked executor
        #[arg(long, default_value_t = 4)]
        jobs: u64,
        /// Duration of the longest simulated operation, in milliseconds
        #[arg(long, default_value_t = 500)]
        max_millis: u64,
        /// Category to ignore (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        /// Give up waiting for idle after this many seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
    /// Print the configuration resolved from the environment
    Config,
}

const CATEGORIES: [Category; 4] = [
    Category::General,
    Category::Network,
    Category::Dialog,
    Category::Animation,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_telemetry(TelemetryConfig {
        log_level: config.log_level.clone(),
        ..TelemetryConfig::default()
    })?;

    match cli.command {
        Command::Demo {
            operations,
            jobs,
            max_millis,
            ignore,
            timeout_secs,
        } => cmd_demo(config, operations, jobs, max_millis, ignore, timeout_secs).await,
        Command::Config => {
            println!("{config:#?}");
            Ok(())
        }
    }
}

async fn cmd_demo(
    mut config: Config,
    operations: u64,
    jobs: u64,
    max_millis: u64,
    ignore: Vec<String>,
    timeout_secs: u64,
) -> anyhow::Result<()> {
    for raw in &ignore {
        config.ignored_categories.push(raw.parse()?);
    }
    let bee = build_tracker(&config)?;
    let resource = BusyBeeIdlingResource::new(Arc::clone(&bee));
    let total = operations.max(1);

    // Busy from the moment each operation is started, not when its task
    // first gets polled.
    let mut handles = Vec::new();
    for i in 0..operations {
        let category = CATEGORIES[(i % 4) as usize].clone();
        let millis = max_millis * (i + 1) / total;
        let guard = BusyGuard::acquire_async(
            Arc::clone(&bee),
            Operation::from(format!("demo-{i}")),
            category,
        )
        .await?;
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            drop(guard);
        }));
    }

    let executor = ExecutorWrapper::with(Arc::clone(&bee))
        .execute_in_category(Category::Network)
        .wrap_executor(Arc::new(tokio::runtime::Handle::current()))
        .build()?;
    for i in 0..jobs {
        let millis = max_millis * (i + 1) / jobs.max(1);
        executor.execute(Box::new(move || {
            std::thread::sleep(Duration::from_millis(millis));
        }));
    }

    println!("started {operations} operations and {jobs} jobs, busy: {}", bee.is_busy());

    let started = Instant::now();
    let wait = IdleWaitConfig {
        timeout: Duration::from_secs(timeout_secs),
        ..IdleWaitConfig::default()
    };
    if let Err(e) = wait_for_idle(&resource, &wait).await {
        eprintln!("{}", bee.to_string_verbose());
        return Err(e.into());
    }
    println!("idle after {:?}", started.elapsed());
    println!("{}", bee.to_string_verbose());

    for handle in handles {
        handle.await?;
    }
    Ok(())
}
