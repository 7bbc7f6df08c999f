use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rxfer",
    version,
    about = "Copy a large file set from slow or flaky removable media, resuming where it left off",
    long_about = "`rxfer` copies every file under SOURCE into TARGET using several parallel workers.

A file copy that does not finish within --timeout is cancelled and the operator is asked \
to reconnect the device. Each worker records its not-yet-copied files in \
`remaining-worker-<N>.json`; passing such a file as SOURCE resumes the transfer.

EXAMPLES:
    # Copy a memory card into the current directory
    rxfer /media/card . --progress --summary

    # Resume a worker's leftovers, re-rooted against the card's mount point
    rxfer remaining-worker-2.json /backup --source-root /media/card"
)]
struct Args {
    // Transfer options
    /// Number of parallel workers, the file list is split into this many contiguous parts
    #[arg(
        long,
        default_value_t = common::config::DEFAULT_WORKERS,
        value_name = "N",
        help_heading = "Transfer options"
    )]
    workers: usize,

    /// Time a single file copy may take, from open to last write, before it is considered stalled
    ///
    /// This option accepts a human readable duration, e.g. "90s", "6min", "1h" etc.
    #[arg(
        long,
        default_value_t = common::config::DEFAULT_TIMEOUT.into(),
        value_name = "DURATION",
        help_heading = "Transfer options"
    )]
    timeout: humantime::Duration,

    /// Treat any non-empty answer to the reconnect prompt as "yes"
    ///
    /// By default only "y" or "yes" retries a stalled file; anything else stops the worker.
    #[arg(long, help_heading = "Transfer options")]
    accept_any_answer: bool,

    // Resume options
    /// Directory for the `remaining-worker-<N>.json` checkpoint files
    #[arg(
        long,
        default_value = ".",
        value_name = "PATH",
        help_heading = "Resume options"
    )]
    checkpoint_dir: std::path::PathBuf,

    /// Root that source paths are made relative to before re-rooting them under TARGET
    ///
    /// Defaults to SOURCE when it is a directory, and to the mount point (drive root on
    /// Windows) of the first listed path when SOURCE is a saved file list.
    #[arg(long, value_name = "PATH", help_heading = "Resume options")]
    source_root: Option<std::path::PathBuf>,

    /// Seed for shuffling a saved file list, shuffled randomly if not given
    #[arg(long, value_name = "N", help_heading = "Resume options")]
    seed: Option<u64>,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Set the type of progress display
    ///
    /// If specified, --progress flag is implied.
    ///
    /// Options are: `ProgressBar` (redrawn progress block), `TextUpdates` (appropriate for logging), Auto (default, will
    /// choose between `ProgressBar` or `TextUpdates` depending on the type of terminal attached to stderr)
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Size of the buffer used to stream each file
    #[arg(
        long,
        default_value = "128KiB",
        value_name = "SIZE",
        help_heading = "Advanced settings"
    )]
    read_buffer: bytesize::ByteSize,

    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads (0 = Tokio default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Directory to copy, or a saved `remaining-worker-<N>.json` file list ("." = current directory)
    #[arg()]
    source: std::path::PathBuf,

    /// Directory to copy into ("." = current directory)
    #[arg()]
    target: std::path::PathBuf,
}

#[instrument]
async fn async_main(args: Args) -> anyhow::Result<common::Summary> {
    let source = common::source::resolve_dir(&args.source)?;
    let target = common::source::resolve_dir(&args.target)?;
    let (files, default_root) = if common::source::is_file_list(&source) {
        let files = common::source::load_file_list(&source, args.seed).await?;
        let root = match files.first() {
            Some(first) => common::source::disk_root(first).await?,
            None => source.clone(),
        };
        (files, root)
    } else {
        (common::source::list_files(&source).await?, source.clone())
    };
    let source_root = args.source_root.clone().unwrap_or(default_root);
    tracing::info!(
        "{} file(s) to copy from {:?} to {:?}",
        files.len(),
        &source_root,
        &target
    );
    let settings = common::TransferSettings {
        workers: args.workers,
        timeout: args.timeout.into(),
        checkpoint_dir: args.checkpoint_dir.clone(),
        answer_policy: if args.accept_any_answer {
            common::AnswerPolicy::AcceptAny
        } else {
            common::AnswerPolicy::Strict
        },
        progress: if args.progress || args.progress_type.is_some() {
            Some(args.progress_type.unwrap_or_default())
        } else {
            None
        },
        read_buffer: usize::try_from(args.read_buffer.0).context("--read-buffer is too large")?,
    };
    settings.validate().map_err(|error| anyhow!(error))?;
    let job = common::job::TransferJob::new(files, source_root, target);
    let copier = std::sync::Arc::new(common::copier::StreamCopier::new(settings.read_buffer));
    let mut gate = common::gate::TerminalGate::new();
    let summary = common::transfer(&job, &settings, copier, &mut gate).await?;
    if summary.workers_failed > 0 {
        if args.summary {
            return Err(anyhow!("rxfer encountered errors\n\n{}", &summary));
        }
        return Err(anyhow!("rxfer encountered errors"));
    }
    Ok(summary)
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(output, runtime, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
