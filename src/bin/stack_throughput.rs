//! stack-throughput: time pushers and poppers hammering one shared stack
//!
//! # Usage
//!
//! ```bash
//! stack-throughput --pushers 2 --poppers 2 --duration-secs 10
//! stack-throughput --variant lock-free --backoff park
//! RUST_LOG=debug stack-throughput --variant locked --duration-secs 3
//! ```
//!
//! Without `--variant`, both stacks are measured back to back.

use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use treiber_stack::driver::{group_thousands, run_variant, DriverConfig, StackVariant};
use treiber_stack::util::BackoffPolicy;

/// Measure how many push/pop operations a stack completes in a fixed window.
#[derive(Parser, Debug)]
#[command(name = "stack-throughput", version)]
#[command(about = "Throughput of the lock-free stack against its locked baseline")]
struct Cli {
    /// Stack to measure; repeat to measure several. Defaults to all.
    #[arg(long = "variant", env = "STACK_VARIANT", value_delimiter = ',')]
    variants: Vec<StackVariant>,

    /// Threads pushing random integers.
    #[arg(long, env = "STACK_PUSHERS", default_value_t = 2)]
    pushers: usize,

    /// Threads popping.
    #[arg(long, env = "STACK_POPPERS", default_value_t = 2)]
    poppers: usize,

    /// Length of the measured window in seconds.
    #[arg(long, env = "STACK_DURATION_SECS", default_value_t = 10.0)]
    duration_secs: f64,

    /// Values pushed before the window opens.
    #[arg(long, env = "STACK_PREFILL", default_value_t = 100_000)]
    prefill: usize,

    /// Pause after a lost CAS: spin, snooze, park or park:<nanos>.
    #[arg(long, env = "STACK_BACKOFF", default_value = "snooze")]
    backoff: BackoffPolicy,
}

impl Cli {
    fn config(&self) -> Result<DriverConfig, String> {
        let duration = Duration::try_from_secs_f64(self.duration_secs)
            .map_err(|err| format!("invalid --duration-secs {}: {}", self.duration_secs, err))?;
        Ok(DriverConfig {
            pushers: self.pushers,
            poppers: self.poppers,
            duration,
            prefill: self.prefill,
            backoff: self.backoff,
        })
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match cli.config() {
        Ok(config) => config,
        Err(msg) => {
            error!("{}", msg);
            process::exit(2);
        }
    };

    let variants = if cli.variants.is_empty() {
        StackVariant::ALL.to_vec()
    } else {
        cli.variants.clone()
    };

    for variant in variants {
        match run_variant(variant, &config) {
            Ok(report) => {
                println!("[{}] {}", variant, report);
                println!(
                    "[{}]   {} ops/sec, {} empty pops, {} contention events",
                    variant,
                    group_thousands(report.ops_per_sec() as u64),
                    group_thousands(report.metrics.empty_pops),
                    group_thousands(report.metrics.contention_events),
                );
            }
            Err(err) => {
                error!(%variant, "throughput run failed: {}", err);
                process::exit(1);
            }
        }
    }
}
