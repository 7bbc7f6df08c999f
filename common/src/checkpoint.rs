use anyhow::{Context, anyhow};

/// Per-worker record of files that have not completed yet.
///
/// Stored as a JSON array of path strings in `remaining-worker-<index>.json`. The file is
/// rewritten on every update and never deleted, so it can be fed back as the source list
/// of a later run. A path that is not valid Unicode is stored as an array of its raw
/// bytes (UTF-16 units on Windows) instead of a string.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: std::path::PathBuf,
}

pub fn file_name(worker_id: usize) -> String {
    format!("remaining-worker-{worker_id}.json")
}

impl Checkpoint {
    pub fn for_worker(dir: &std::path::Path, worker_id: usize) -> Self {
        Self {
            path: dir.join(file_name(worker_id)),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Overwrite the checkpoint with `remaining`.
    ///
    /// Written to a temporary file first and renamed into place so a crash never leaves a
    /// truncated checkpoint behind.
    pub async fn save(&self, remaining: &[std::path::PathBuf]) -> anyhow::Result<()> {
        let entries: Vec<_> = remaining.iter().map(|path| encode(path.as_path())).collect();
        let data = serde_json::to_vec(&entries)
            .with_context(|| format!("failed serializing checkpoint {:?}", &self.path))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("failed writing checkpoint {:?}", &tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed renaming {:?} to {:?}", &tmp, &self.path))?;
        tracing::trace!(
            "checkpoint {:?}: {} file(s) remaining",
            &self.path,
            remaining.len()
        );
        Ok(())
    }

    pub async fn load(&self) -> anyhow::Result<Vec<std::path::PathBuf>> {
        load_file_list(&self.path).await
    }
}

/// Read a JSON array of paths, as written by [`Checkpoint::save`].
pub async fn load_file_list(path: &std::path::Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed reading file list {:?}", &path))?;
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&data).with_context(|| {
        format!(
            "failed parsing file list {:?}, expected a JSON array of paths",
            &path
        )
    })?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            decode(entry)
                .with_context(|| format!("invalid entry {} in file list {:?}", index, &path))
        })
        .collect()
}

fn encode(path: &std::path::Path) -> serde_json::Value {
    match path.to_str() {
        Some(text) => serde_json::Value::from(text),
        None => serde_json::Value::from(raw_units(path.as_os_str())),
    }
}

fn decode(entry: serde_json::Value) -> anyhow::Result<std::path::PathBuf> {
    match entry {
        serde_json::Value::String(text) => Ok(std::path::PathBuf::from(text)),
        serde_json::Value::Array(units) => {
            let units = units
                .iter()
                .map(|unit| {
                    unit.as_u64()
                        .ok_or_else(|| anyhow!("expected an integer, got {}", unit))
                })
                .collect::<anyhow::Result<Vec<u64>>>()?;
            Ok(std::path::PathBuf::from(from_raw_units(&units)?))
        }
        other => Err(anyhow!(
            "expected a path string or an array of bytes, got {}",
            other
        )),
    }
}

#[cfg(unix)]
fn raw_units(path: &std::ffi::OsStr) -> Vec<u64> {
    use std::os::unix::ffi::OsStrExt;
    path.as_bytes().iter().map(|&byte| u64::from(byte)).collect()
}

#[cfg(unix)]
fn from_raw_units(units: &[u64]) -> anyhow::Result<std::ffi::OsString> {
    use std::os::unix::ffi::OsStringExt;
    let bytes = units
        .iter()
        .map(|&unit| u8::try_from(unit).map_err(|_| anyhow!("{} is not a byte", unit)))
        .collect::<anyhow::Result<Vec<u8>>>()?;
    Ok(std::ffi::OsString::from_vec(bytes))
}

#[cfg(windows)]
fn raw_units(path: &std::ffi::OsStr) -> Vec<u64> {
    use std::os::windows::ffi::OsStrExt;
    path.encode_wide().map(u64::from).collect()
}

#[cfg(windows)]
fn from_raw_units(units: &[u64]) -> anyhow::Result<std::ffi::OsString> {
    use std::os::windows::ffi::OsStringExt;
    let wide = units
        .iter()
        .map(|&unit| {
            u16::try_from(unit).map_err(|_| anyhow!("{} is not a UTF-16 unit", unit))
        })
        .collect::<anyhow::Result<Vec<u16>>>()?;
    Ok(std::ffi::OsString::from_wide(&wide))
}
