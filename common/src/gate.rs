//! Operator prompt shown when a transfer stalls.
//!
//! Only the coordinator owns a gate, so prompts are never shown concurrently. The gate
//! returns the raw answer; deciding what it means is left to
//! [`AnswerPolicy`](crate::config::AnswerPolicy).

use anyhow::Context;
use std::io::Write;

pub const PROMPT: &str = "Operation timed out. Reconnect the device and continue? (yes/no): ";

pub trait ReconnectGate: Send {
    /// Ask whether the transfer of `key` should be retried, returns the raw answer.
    fn ask(
        &mut self,
        key: &std::path::Path,
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}

/// Prompts on stderr and reads one line from stdin.
///
/// A closed stdin yields an empty answer.
#[derive(Debug, Default)]
pub struct TerminalGate;

impl TerminalGate {
    pub fn new() -> Self {
        Self
    }
}

impl ReconnectGate for TerminalGate {
    async fn ask(&mut self, key: &std::path::Path) -> anyhow::Result<String> {
        let key = key.to_path_buf();
        tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr)?;
            writeln!(stderr, "Stalled transfer: {}", key.display())?;
            write!(stderr, "{PROMPT}")?;
            stderr.flush()?;
            let mut answer = String::new();
            std::io::stdin()
                .read_line(&mut answer)
                .context("failed reading answer from stdin")?;
            Ok(answer.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .context("prompt task failed")?
    }
}
