/// Process-wide "waiting for the operator" flag.
///
/// Backed by a `watch` channel: the current value is readable without blocking and every
/// change is broadcast to tasks waiting in [`PauseState::wait_resumed`]. Writes are
/// last-write-wins.
#[derive(Debug, Clone)]
pub struct PauseState {
    sender: std::sync::Arc<tokio::sync::watch::Sender<bool>>,
}

impl PauseState {
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::watch::channel(false);
        Self {
            sender: std::sync::Arc::new(sender),
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn set_paused(&self, paused: bool) {
        let previous = self.sender.send_replace(paused);
        if previous != paused {
            tracing::debug!("pause state: {} -> {}", previous, paused);
        }
    }

    /// Wait until the flag is cleared, returns immediately if it isn't set.
    pub async fn wait_resumed(&self) {
        let mut receiver = self.sender.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = receiver.wait_for(|paused| !*paused).await;
    }
}

impl Default for PauseState {
    fn default() -> Self {
        Self::new()
    }
}
