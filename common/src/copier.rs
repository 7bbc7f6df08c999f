use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Result of a single copy attempt that did not fail with an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Destination is fully written, flushed and closed.
    Completed { bytes: u64 },
    /// Copy was stopped by an external cancellation request.
    Cancelled,
}

/// Copies a single file from `src` to `dst`, honoring `cancel`.
///
/// Implementations must stop writing promptly once `cancel` is triggered and report
/// [`CopyOutcome::Cancelled`], never [`CopyOutcome::Completed`], in that case.
pub trait Copier: Send + Sync + 'static {
    fn copy(
        &self,
        src: &std::path::Path,
        dst: &std::path::Path,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = anyhow::Result<CopyOutcome>> + Send;
}

/// Chunked byte-stream copier, overwrites an existing destination.
#[derive(Debug, Clone, Copy)]
pub struct StreamCopier {
    read_buffer: usize,
}

impl StreamCopier {
    pub fn new(read_buffer: usize) -> Self {
        assert!(read_buffer > 0);
        Self { read_buffer }
    }
}

impl Default for StreamCopier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_READ_BUFFER)
    }
}

/// Remove a partially written destination, a missing file is not an error.
pub async fn remove_partial(dst: &std::path::Path) -> anyhow::Result<()> {
    match tokio::fs::remove_file(dst).await {
        Ok(()) => {
            tracing::debug!("removed partial file {:?}", dst);
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => {
            Err(error).with_context(|| format!("failed removing partial file {:?}", &dst))
        }
    }
}

impl Copier for StreamCopier {
    #[instrument(skip(self, cancel))]
    async fn copy(
        &self,
        src: &std::path::Path,
        dst: &std::path::Path,
        cancel: &CancellationToken,
    ) -> anyhow::Result<CopyOutcome> {
        if cancel.is_cancelled() {
            return Ok(CopyOutcome::Cancelled);
        }
        tracing::debug!("opening 'src' for reading and 'dst' for writing");
        let mut reader = tokio::fs::File::open(src)
            .await
            .with_context(|| format!("cannot open {:?} for reading", &src))?;
        let mut writer = tokio::fs::File::create(dst)
            .await
            .with_context(|| format!("cannot open {:?} for writing", &dst))?;
        let mut buffer = vec![0u8; self.read_buffer];
        let mut bytes = 0u64;
        loop {
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                read = reader.read(&mut buffer) => {
                    Some(read.with_context(|| format!("failed reading from {:?}", &src))?)
                }
            };
            let Some(read) = read else {
                drop(writer);
                remove_partial(dst).await?;
                return Ok(CopyOutcome::Cancelled);
            };
            if read == 0 {
                break;
            }
            let written = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                res = writer.write_all(&buffer[..read]) => {
                    res.with_context(|| format!("failed writing to {:?}", &dst))?;
                    true
                }
            };
            if !written {
                drop(writer);
                remove_partial(dst).await?;
                return Ok(CopyOutcome::Cancelled);
            }
            bytes += read as u64;
        }
        writer
            .flush()
            .await
            .with_context(|| format!("failed flushing {:?}", &dst))?;
        drop(writer);
        tracing::debug!("copied {} bytes", bytes);
        Ok(CopyOutcome::Completed { bytes })
    }
}
