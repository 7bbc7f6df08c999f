//! Root of a transfer run.
//!
//! Partitions the job, spawns one [`Worker`] per non-empty partition and then serves
//! worker events until every worker has exited. The coordinator is the only place that
//! renders progress or talks to the operator.

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{Instrument, instrument};

use crate::checkpoint::Checkpoint;
use crate::config::TransferSettings;
use crate::copier::Copier;
use crate::gate::ReconnectGate;
use crate::job::TransferJob;
use crate::pause::PauseState;
use crate::progress::{AggregateProgress, ProgressDisplay};
use crate::worker::{Shared, Summary, UserInput, Worker, WorkerEvent};

/// Copy every file of `job`, returns the combined summary of all workers.
///
/// Worker failures are logged and counted in [`Summary::workers_failed`]; only setup
/// errors are returned as `Err`.
#[instrument(skip(job, copier, gate), fields(files = job.len()))]
pub async fn transfer<C: Copier, G: ReconnectGate>(
    job: &TransferJob,
    settings: &TransferSettings,
    copier: std::sync::Arc<C>,
    gate: &mut G,
) -> anyhow::Result<Summary> {
    settings
        .validate()
        .map_err(|error| anyhow::anyhow!("invalid transfer settings: {}", error))?;
    tokio::fs::create_dir_all(&settings.checkpoint_dir)
        .await
        .with_context(|| {
            format!(
                "cannot create checkpoint directory {:?}",
                &settings.checkpoint_dir
            )
        })?;
    let pause = PauseState::new();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let shared = Shared {
        source_root: job.source_root().to_path_buf(),
        target_root: job.target_root().to_path_buf(),
        copier,
        timeout: settings.timeout,
        answer_policy: settings.answer_policy,
        pause: pause.clone(),
        events: events_tx,
    };
    let mut replies = std::collections::HashMap::new();
    let mut join_set = tokio::task::JoinSet::new();
    for (id, partition) in job.partition(settings.workers)?.into_iter().enumerate() {
        let checkpoint = Checkpoint::for_worker(&settings.checkpoint_dir, id);
        if partition.is_empty() {
            // overwrite whatever an earlier run left behind under this index
            if let Err(error) = checkpoint.save(&[]).await {
                tracing::error!("{:#}", &error);
            }
            continue;
        }
        tracing::info!("worker {}: {} file(s)", id, partition.len());
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<UserInput>();
        replies.insert(id, reply_tx);
        let worker = Worker::new(id, partition, checkpoint, shared.clone(), reply_rx);
        join_set.spawn(
            worker
                .run()
                .instrument(tracing::info_span!("worker", worker_id = id)),
        );
    }
    // workers hold the remaining senders, the event loop ends once they all exit
    drop(shared);
    let mut progress = AggregateProgress::new(job.len() as u64);
    let mut display = match settings.progress {
        Some(progress_type) => Some(ProgressDisplay::new(progress_type, progress.total())?),
        None => None,
    };
    if let Some(display) = display.as_mut() {
        display.update(0);
    }
    while let Some(event) = events_rx.recv().await {
        match event {
            WorkerEvent::FileCopied { worker_id } => {
                let completed = progress.record();
                tracing::debug!(
                    "worker {} copied a file, {}/{} done",
                    worker_id,
                    completed,
                    progress.total()
                );
                show_progress(display.as_mut(), &pause, completed);
            }
            WorkerEvent::RequestUserInput { worker_id, key } => {
                tracing::warn!("worker {} stalled on {:?}", worker_id, &key);
                pause.set_paused(true);
                let answer = match gate.ask(&key).await {
                    Ok(answer) => answer,
                    Err(error) => {
                        tracing::error!("no answer for {:?}: {:#}", &key, &error);
                        String::new()
                    }
                };
                pause.set_paused(false);
                let reply = UserInput { key, answer };
                match replies.get(&worker_id) {
                    Some(reply_tx) => {
                        if reply_tx.send(reply).is_err() {
                            tracing::warn!("worker {} exited before its answer arrived", worker_id);
                        }
                    }
                    None => tracing::error!("request from unknown worker {}", worker_id),
                }
            }
        }
    }
    let mut summary = Summary::default();
    while let Some(res) = join_set.join_next().await {
        match res.context("worker task failed")? {
            Ok(worker_summary) => summary = summary + worker_summary,
            Err(error) => {
                tracing::error!("{:#}", &error);
                summary = summary + error.summary;
            }
        }
    }
    if let Some(display) = display {
        display.finish();
    }
    if progress.is_done() {
        eprintln!("Operation done!");
    }
    tracing::info!(
        "transferred {}/{} file(s)",
        progress.completed(),
        progress.total()
    );
    Ok(summary)
}

/// Redraw progress unless the operator is being asked about a stall.
///
/// Returns whether anything was drawn.
fn show_progress(
    display: Option<&mut ProgressDisplay>,
    pause: &PauseState,
    completed: u64,
) -> bool {
    match display {
        Some(display) if !pause.is_paused() => display.update(completed),
        _ => false,
    }
}
