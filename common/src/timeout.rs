use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::copier::{Copier, CopyOutcome, remove_partial};

/// Race a copy against a timer.
///
/// Whichever finishes first decides the outcome. When the timer wins the copy is signalled
/// through its cancellation token, the in-flight copy future is dropped (so it can never
/// report completion afterwards) and the partially written destination is removed.
#[instrument(skip(copier))]
pub async fn copy_with_timeout<C: Copier>(
    copier: &C,
    src: &std::path::Path,
    dst: &std::path::Path,
    timeout: std::time::Duration,
) -> anyhow::Result<CopyOutcome> {
    let cancel = CancellationToken::new();
    match tokio::time::timeout(timeout, copier.copy(src, dst, &cancel)).await {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!("copy of {:?} timed out after {:?}", src, timeout);
            cancel.cancel();
            remove_partial(dst).await?;
            Ok(CopyOutcome::Cancelled)
        }
    }
}
