use anyhow::Context;
use std::io::IsTerminal;

/// How progress is rendered
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// `ProgressBar` if stderr is a terminal, `TextUpdates` otherwise
    #[default]
    #[value(alias = "Auto")]
    Auto,
    /// Redrawn progress block
    #[value(alias = "ProgressBar")]
    ProgressBar,
    /// One line per update, appropriate for logging
    #[value(alias = "TextUpdates")]
    TextUpdates,
}

/// Running total of completed files, owned by the coordinator.
///
/// Never decreases and never exceeds the total.
#[derive(Debug, Clone)]
pub struct AggregateProgress {
    completed: u64,
    total: u64,
}

impl AggregateProgress {
    pub fn new(total: u64) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// Count one completed file and return the new total.
    pub fn record(&mut self) -> u64 {
        if self.completed >= self.total {
            tracing::debug!(
                "Progress overflow - completed: {}, total: {}",
                self.completed,
                self.total
            );
            return self.completed;
        }
        self.completed += 1;
        self.completed
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

pub fn percentage(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    std::cmp::min(completed, total) * 100 / total
}

pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
}

enum Output {
    Bar(indicatif::ProgressBar),
    Text,
}

/// Terminal rendering of [`AggregateProgress`].
///
/// Redraws only when the integer percentage grows; the caller skips updates entirely
/// while the run is paused for operator input.
pub struct ProgressDisplay {
    output: Output,
    total: u64,
    last_percent: Option<u64>,
    start: std::time::Instant,
}

impl ProgressDisplay {
    pub fn new(progress_type: ProgressType, total: u64) -> anyhow::Result<Self> {
        let progress_type = match progress_type {
            ProgressType::Auto => {
                if std::io::stderr().is_terminal() {
                    ProgressType::ProgressBar
                } else {
                    ProgressType::TextUpdates
                }
            }
            other => other,
        };
        let output = match progress_type {
            ProgressType::ProgressBar => {
                let bar = indicatif::ProgressBar::with_draw_target(
                    Some(total),
                    indicatif::ProgressDrawTarget::stderr(),
                );
                let style = indicatif::ProgressStyle::with_template(
                    "Progress: [{bar:50}] {percent}%\nTotal: {pos}/{len}\nElapsed Time: {msg}",
                )
                .context("invalid progress bar template")?
                .progress_chars("#-");
                bar.set_style(style);
                Output::Bar(bar)
            }
            _ => Output::Text,
        };
        Ok(Self {
            output,
            total,
            last_percent: None,
            start: std::time::Instant::now(),
        })
    }

    /// Render `completed` if the integer percentage changed, returns whether it rendered.
    pub fn update(&mut self, completed: u64) -> bool {
        let percent = percentage(completed, self.total);
        if self.last_percent.is_some_and(|last| percent <= last) {
            return false;
        }
        self.last_percent = Some(percent);
        let elapsed = format_elapsed(self.start.elapsed());
        match &self.output {
            Output::Bar(bar) => {
                bar.set_message(elapsed);
                bar.set_position(std::cmp::min(completed, self.total));
            }
            Output::Text => {
                eprintln!(
                    "Progress: {}% | Total: {}/{} | Elapsed Time: {}",
                    percent, completed, self.total, elapsed
                );
            }
        }
        true
    }

    pub fn finish(&self) {
        if let Output::Bar(bar) = &self.output {
            bar.abandon();
        }
    }
}
