//! Resumable parallel bulk transfer engine behind the `rxfer` tool.
//!
//! A run copies a fixed list of files from a source root to a target root, tolerating
//! removable media that stall or disconnect mid-transfer.
//!
//! # Overview
//!
//! - [`job::TransferJob`] holds the input list and is split into contiguous partitions,
//!   one per worker.
//! - Each [`worker::Worker`] drains its partition in order. Every copy is raced against a
//!   timeout ([`timeout::copy_with_timeout`]); a stalled copy is cancelled and its partial
//!   destination removed.
//! - After a stall the worker asks the coordinator to prompt the operator. The prompt goes
//!   through a [`gate::ReconnectGate`] and is correlated with the stalled file path, so
//!   answers are never delivered to the wrong worker. While the operator is being asked,
//!   [`pause::PauseState`] is set: progress output is suppressed and other workers that
//!   stall wait for the answer instead of prompting again.
//! - Workers persist their not-yet-completed files to `remaining-worker-<N>.json`
//!   ([`checkpoint::Checkpoint`]) before and after every copy. Such a file can be passed
//!   back as the source of a later run to resume.
//!
//! # Logging
//!
//! Logs are written to stdout through `tracing`. Progress and prompts go to stderr.
//! Verbosity is chosen with [`OutputConfig::verbose`] and can be overridden with
//! `RUST_LOG`.

pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod copier;
pub mod gate;
pub mod job;
pub mod pause;
pub mod progress;
pub mod source;
pub mod timeout;
pub mod worker;

#[cfg(test)]
pub mod testutils;

pub use config::{AnswerPolicy, OutputConfig, RuntimeConfig, TransferSettings};
pub use coordinator::transfer;
pub use progress::ProgressType;
pub use worker::Summary;

fn init_tracing(output: &OutputConfig) {
    let level = if output.quiet {
        "off"
    } else {
        match output.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level));
    let filter = match filter {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("invalid log filter: {error}");
            return;
        }
    };
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
}

/// Run `func` on a multi-threaded tokio runtime configured by `runtime`.
///
/// Installs logging, prints the summary if requested and logs the error if `func` fails.
/// Returns `None` on any failure, callers should exit with a non-zero status then.
pub fn run<Func, Fut>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: Func,
) -> Option<Summary>
where
    Func: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
{
    init_tracing(&output);
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let tokio_runtime = match builder.build() {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => {
            tracing::error!("failed to start tokio runtime: {}", &error);
            return None;
        }
    };
    match tokio_runtime.block_on(func()) {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            None
        }
    }
}
