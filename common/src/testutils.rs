use std::collections::{HashMap, HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

use crate::copier::{Copier, CopyOutcome, StreamCopier};
use crate::gate::ReconnectGate;

pub async fn create_temp_dir() -> anyhow::Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("rxfer_test{}", &idx));
        if let Err(error) = tokio::fs::create_dir(&tmp_dir).await {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

pub async fn setup_test_dir() -> anyhow::Result<std::path::PathBuf> {
    // create a temporary directory
    let tmp_dir = create_temp_dir().await?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- 5.txt -> ../bar/2.txt
    //    |- loop -> (absolute path) .../foo
    let foo_path = tmp_dir.join("foo");
    tokio::fs::create_dir(&foo_path).await?;
    tokio::fs::write(foo_path.join("0.txt"), "0").await?;
    let bar_path = foo_path.join("bar");
    tokio::fs::create_dir(&bar_path).await?;
    tokio::fs::write(bar_path.join("1.txt"), "1").await?;
    tokio::fs::write(bar_path.join("2.txt"), "2").await?;
    tokio::fs::write(bar_path.join("3.txt"), "3").await?;
    let baz_path = foo_path.join("baz");
    tokio::fs::create_dir(&baz_path).await?;
    tokio::fs::write(baz_path.join("4.txt"), "4").await?;
    tokio::fs::symlink("../bar/2.txt", baz_path.join("5.txt")).await?;
    tokio::fs::symlink(&foo_path, baz_path.join("loop")).await?;
    Ok(tmp_dir)
}

/// Create `count` small files named `<index>.txt` under `dir`, returns their paths in order.
pub async fn create_files(
    dir: &std::path::Path,
    count: usize,
) -> anyhow::Result<Vec<std::path::PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut files = Vec::with_capacity(count);
    for idx in 0..count {
        let path = dir.join(format!("{idx}.txt"));
        tokio::fs::write(&path, format!("contents of file {idx}")).await?;
        files.push(path);
    }
    Ok(files)
}

/// Gate answering from a fixed script and recording which keys it was asked about.
///
/// Runs out of answers as if stdin was closed (empty answer).
#[derive(Debug, Default)]
pub struct ScriptedGate {
    answers: VecDeque<String>,
    asked: std::sync::Arc<std::sync::Mutex<Vec<std::path::PathBuf>>>,
    delay: std::time::Duration,
}

impl ScriptedGate {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|answer| answer.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Hold every prompt open for `delay` before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn asked(&self) -> Vec<std::path::PathBuf> {
        self.asked.lock().unwrap().clone()
    }
}

impl ReconnectGate for ScriptedGate {
    async fn ask(&mut self, key: &std::path::Path) -> anyhow::Result<String> {
        self.asked.lock().unwrap().push(key.to_path_buf());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

/// Stream copier that stalls, slows down or fails on selected source files.
///
/// A stalled attempt writes a partial destination and then waits for cancellation.
#[derive(Debug, Default)]
pub struct ScriptedCopier {
    inner: StreamCopier,
    stalls: std::sync::Mutex<HashMap<std::path::PathBuf, usize>>,
    delays: HashMap<std::path::PathBuf, std::time::Duration>,
    failures: HashSet<std::path::PathBuf>,
    attempts: std::sync::Mutex<HashMap<std::path::PathBuf, usize>>,
}

impl ScriptedCopier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stall the first `times` attempts to copy `src`.
    pub fn stall(self, src: &std::path::Path, times: usize) -> Self {
        self.stalls.lock().unwrap().insert(src.to_path_buf(), times);
        self
    }

    /// Spend `delay` before every copy of `src`, still giving up early when cancelled.
    pub fn delay(mut self, src: &std::path::Path, delay: std::time::Duration) -> Self {
        self.delays.insert(src.to_path_buf(), delay);
        self
    }

    /// Fail every attempt to copy `src` with an I/O error.
    pub fn fail(mut self, src: &std::path::Path) -> Self {
        self.failures.insert(src.to_path_buf());
        self
    }

    pub fn attempts(&self, src: &std::path::Path) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(src)
            .copied()
            .unwrap_or_default()
    }
}

impl Copier for ScriptedCopier {
    async fn copy(
        &self,
        src: &std::path::Path,
        dst: &std::path::Path,
        cancel: &CancellationToken,
    ) -> anyhow::Result<CopyOutcome> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(src.to_path_buf())
            .or_default() += 1;
        if self.failures.contains(src) {
            return Err(anyhow::anyhow!("device error while reading {:?}", src));
        }
        if let Some(delay) = self.delays.get(src) {
            tokio::select! {
                _ = tokio::time::sleep(*delay) => {}
                _ = cancel.cancelled() => return Ok(CopyOutcome::Cancelled),
            }
        }
        let stall = {
            let mut stalls = self.stalls.lock().unwrap();
            match stalls.get_mut(src) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if stall {
            tokio::fs::write(dst, "partial").await?;
            cancel.cancelled().await;
            return Ok(CopyOutcome::Cancelled);
        }
        self.inner.copy(src, dst, cancel).await
    }
}
