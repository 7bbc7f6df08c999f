//! Configuration types for runtime and execution settings

/// Per-file timeout used when none is configured: 100 * 60 * 60 milliseconds.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(100 * 60 * 60);

/// Number of parallel transfer workers used when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Read buffer used by the stream copier when none is configured.
pub const DEFAULT_READ_BUFFER: usize = 128 * 1024;

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// How an operator's answer to the reconnect prompt is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnswerPolicy {
    /// Only "y" or "yes" (case-insensitive) means the device was reconnected.
    #[default]
    Strict,
    /// Any non-empty answer means the device was reconnected.
    AcceptAny,
}

impl AnswerPolicy {
    pub fn is_reconnected(&self, answer: &str) -> bool {
        let answer = answer.trim();
        match self {
            AnswerPolicy::Strict => {
                answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
            }
            AnswerPolicy::AcceptAny => !answer.is_empty(),
        }
    }
}

/// Settings for a single transfer run
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Number of partitions / parallel workers
    pub workers: usize,
    /// Per-file timeout before a transfer is considered stalled
    pub timeout: std::time::Duration,
    /// Directory holding the `remaining-worker-<N>.json` checkpoint files
    pub checkpoint_dir: std::path::PathBuf,
    /// Interpretation of the reconnect prompt answer
    pub answer_policy: AnswerPolicy,
    /// Progress display, `None` disables it
    pub progress: Option<crate::ProgressType>,
    /// Stream copier read buffer size (bytes)
    pub read_buffer: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            checkpoint_dir: std::path::PathBuf::from("."),
            answer_policy: AnswerPolicy::default(),
            progress: None,
            read_buffer: DEFAULT_READ_BUFFER,
        }
    }
}

impl TransferSettings {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        if self.read_buffer == 0 {
            return Err("read_buffer must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_policy_only_accepts_yes() {
        let policy = AnswerPolicy::Strict;
        assert!(policy.is_reconnected("yes"));
        assert!(policy.is_reconnected("Y\n"));
        assert!(policy.is_reconnected("  YES  "));
        assert!(!policy.is_reconnected("no"));
        assert!(!policy.is_reconnected("sure"));
        assert!(!policy.is_reconnected(""));
    }

    #[test]
    fn accept_any_policy_only_rejects_empty() {
        let policy = AnswerPolicy::AcceptAny;
        assert!(policy.is_reconnected("yes"));
        assert!(policy.is_reconnected("no"));
        assert!(!policy.is_reconnected(""));
        assert!(!policy.is_reconnected(" \n"));
    }

    #[test]
    fn default_timeout_is_six_minutes() {
        assert_eq!(DEFAULT_TIMEOUT, std::time::Duration::from_secs(360));
    }

    #[test]
    fn validate_rejects_zero_values() {
        let settings = TransferSettings {
            workers: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = TransferSettings {
            timeout: std::time::Duration::ZERO,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(TransferSettings::default().validate().is_ok());
    }
}
