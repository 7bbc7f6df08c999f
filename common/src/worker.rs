use anyhow::{Context, anyhow};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::Checkpoint;
use crate::config::AnswerPolicy;
use crate::copier::{Copier, CopyOutcome};
use crate::job::Partition;
use crate::pause::PauseState;

/// Message sent from a worker to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    FileCopied {
        worker_id: usize,
    },
    /// The copy of `key` stalled; the worker waits for a [`UserInput`] with the same key.
    RequestUserInput {
        worker_id: usize,
        key: std::path::PathBuf,
    },
}

/// Operator answer relayed from the coordinator to the worker that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub key: std::path::PathBuf,
    pub answer: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_copied: usize,
    pub bytes_copied: u64,
    pub stalls: usize,
    pub retries: usize,
    pub workers_finished: usize,
    pub workers_declined: usize,
    pub workers_failed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_copied: self.files_copied + other.files_copied,
            bytes_copied: self.bytes_copied + other.bytes_copied,
            stalls: self.stalls + other.stalls,
            retries: self.retries + other.retries,
            workers_finished: self.workers_finished + other.workers_finished,
            workers_declined: self.workers_declined + other.workers_declined,
            workers_failed: self.workers_failed + other.workers_failed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files copied: {}\n\
            bytes copied: {}\n\
            stalls: {}\n\
            retries: {}\n\
            workers finished: {}\n\
            workers declined: {}\n\
            workers failed: {}\n",
            self.files_copied,
            bytesize::ByteSize(self.bytes_copied),
            self.stalls,
            self.retries,
            self.workers_finished,
            self.workers_declined,
            self.workers_failed,
        )
    }
}

/// Error type for a worker that stopped on an I/O failure.
///
/// Carries the [`Summary`] of what the worker completed before failing.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

/// State shared by all workers of one run.
#[derive(Debug)]
pub struct Shared<C> {
    pub source_root: std::path::PathBuf,
    pub target_root: std::path::PathBuf,
    pub copier: std::sync::Arc<C>,
    pub timeout: std::time::Duration,
    pub answer_policy: AnswerPolicy,
    pub pause: PauseState,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
}

impl<C> Clone for Shared<C> {
    fn clone(&self) -> Self {
        Self {
            source_root: self.source_root.clone(),
            target_root: self.target_root.clone(),
            copier: self.copier.clone(),
            timeout: self.timeout,
            answer_policy: self.answer_policy,
            pause: self.pause.clone(),
            events: self.events.clone(),
        }
    }
}

enum Exit {
    Finished,
    Declined,
}

/// Drains one [`Partition`] strictly in order.
pub struct Worker<C> {
    id: usize,
    partition: Partition,
    checkpoint: Checkpoint,
    shared: Shared<C>,
    replies: mpsc::UnboundedReceiver<UserInput>,
}

impl<C: Copier> Worker<C> {
    pub fn new(
        id: usize,
        partition: Partition,
        checkpoint: Checkpoint,
        shared: Shared<C>,
        replies: mpsc::UnboundedReceiver<UserInput>,
    ) -> Self {
        Self {
            id,
            partition,
            checkpoint,
            shared,
            replies,
        }
    }

    pub async fn run(mut self) -> Result<Summary, Error> {
        let mut summary = Summary::default();
        match self.drain(&mut summary).await {
            Ok(Exit::Finished) => {
                tracing::info!("worker {} finished", self.id);
                summary.workers_finished += 1;
                Ok(summary)
            }
            Ok(Exit::Declined) => {
                tracing::info!(
                    "worker {} stopped, {} file(s) left in {:?}",
                    self.id,
                    self.partition.remaining().len(),
                    self.checkpoint.path()
                );
                summary.workers_declined += 1;
                Ok(summary)
            }
            Err(error) => {
                summary.workers_failed += 1;
                Err(Error::new(
                    error.context(format!(
                        "worker {} failed, {} file(s) left in {:?}",
                        self.id,
                        self.partition.remaining().len(),
                        self.checkpoint.path()
                    )),
                    summary,
                ))
            }
        }
    }

    async fn drain(&mut self, summary: &mut Summary) -> anyhow::Result<Exit> {
        while let Some(src) = self.partition.current().map(|path| path.to_path_buf()) {
            let dst = crate::job::reroot(
                &src,
                &self.shared.source_root,
                &self.shared.target_root,
            )?;
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("cannot create directory {:?}", &parent))?;
            }
            self.persist().await;
            let outcome = crate::timeout::copy_with_timeout(
                self.shared.copier.as_ref(),
                &src,
                &dst,
                self.shared.timeout,
            )
            .await?;
            let bytes = match outcome {
                CopyOutcome::Completed { bytes } => bytes,
                CopyOutcome::Cancelled => {
                    summary.stalls += 1;
                    if !self.request_reconnect(&src).await {
                        return Ok(Exit::Declined);
                    }
                    if !crate::source::is_disk_readable(&self.shared.source_root).await {
                        tracing::warn!(
                            "source root {:?} is still not readable, retrying {:?} anyway",
                            &self.shared.source_root,
                            &src
                        );
                    }
                    summary.retries += 1;
                    // the retry runs without a timeout guard
                    match self
                        .shared
                        .copier
                        .copy(&src, &dst, &CancellationToken::new())
                        .await
                        .with_context(|| format!("retry of {:?} failed", &src))?
                    {
                        CopyOutcome::Completed { bytes } => bytes,
                        CopyOutcome::Cancelled => {
                            return Err(anyhow!("retry of {:?} was cancelled", &src));
                        }
                    }
                }
            };
            summary.files_copied += 1;
            summary.bytes_copied += bytes;
            if self
                .shared
                .events
                .send(WorkerEvent::FileCopied { worker_id: self.id })
                .is_err()
            {
                tracing::debug!("coordinator is gone, not reporting {:?}", &src);
            }
            self.partition.mark_completed(&src)?;
            self.persist().await;
        }
        Ok(Exit::Finished)
    }

    /// Returns whether the device holding `key` was reconnected.
    async fn request_reconnect(&mut self, key: &std::path::Path) -> bool {
        if self.shared.pause.is_paused() {
            tracing::info!(
                "worker {}: operator is already being asked, waiting before retrying {:?}",
                self.id,
                key
            );
            self.shared.pause.wait_resumed().await;
            return true;
        }
        let request = WorkerEvent::RequestUserInput {
            worker_id: self.id,
            key: key.to_path_buf(),
        };
        if self.shared.events.send(request).is_err() {
            tracing::warn!("coordinator is gone, cannot ask about {:?}", key);
            return false;
        }
        while let Some(reply) = self.replies.recv().await {
            if reply.key == key {
                let reconnected = self.shared.answer_policy.is_reconnected(&reply.answer);
                tracing::info!(
                    "worker {}: answer {:?} for {:?}, reconnected: {}",
                    self.id,
                    &reply.answer,
                    key,
                    reconnected
                );
                return reconnected;
            }
            tracing::warn!(
                "worker {}: discarding answer for {:?} while waiting for {:?}",
                self.id,
                &reply.key,
                key
            );
        }
        false
    }

    async fn persist(&self) {
        if let Err(error) = self.checkpoint.save(self.partition.remaining()).await {
            tracing::error!("{:#}", &error);
        }
    }
}
