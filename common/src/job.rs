//! Transfer job definition and work partitioning.
//!
//! A [`TransferJob`] is the immutable input of a run: the ordered list of absolute source
//! paths plus the source and target roots. [`TransferJob::partition`] splits the list into
//! contiguous [`Partition`]s, one per worker, each of at most `⌈total / workers⌉` files.

use anyhow::anyhow;

#[derive(Debug, Clone)]
pub struct TransferJob {
    files: Vec<std::path::PathBuf>,
    source_root: std::path::PathBuf,
    target_root: std::path::PathBuf,
}

impl TransferJob {
    /// Duplicate paths are dropped, keeping the first occurrence.
    pub fn new(
        files: Vec<std::path::PathBuf>,
        source_root: std::path::PathBuf,
        target_root: std::path::PathBuf,
    ) -> Self {
        let mut seen = std::collections::HashSet::with_capacity(files.len());
        let input_len = files.len();
        let files: Vec<_> = files
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect();
        if files.len() != input_len {
            tracing::warn!(
                "dropped {} duplicate path(s) from the file list",
                input_len - files.len()
            );
        }
        Self {
            files,
            source_root,
            target_root,
        }
    }

    pub fn files(&self) -> &[std::path::PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn source_root(&self) -> &std::path::Path {
        &self.source_root
    }

    pub fn target_root(&self) -> &std::path::Path {
        &self.target_root
    }

    /// Split the file list into `workers` contiguous partitions.
    ///
    /// Always returns exactly `workers` partitions; trailing ones may be empty.
    pub fn partition(&self, workers: usize) -> anyhow::Result<Vec<Partition>> {
        Ok(partition(&self.files, workers)?
            .into_iter()
            .map(Partition::new)
            .collect())
    }
}

// callers guarantee workers > 0
fn chunk_size(total: usize, workers: usize) -> usize {
    total.div_ceil(workers)
}

pub fn partition(
    files: &[std::path::PathBuf],
    workers: usize,
) -> anyhow::Result<Vec<Vec<std::path::PathBuf>>> {
    if workers == 0 {
        return Err(anyhow!(
            "cannot split {} file(s) across 0 workers",
            files.len()
        ));
    }
    let chunk = chunk_size(files.len(), workers);
    Ok((0..workers)
        .map(|index| {
            let start = std::cmp::min(index * chunk, files.len());
            let end = std::cmp::min(start + chunk, files.len());
            files[start..end].to_vec()
        })
        .collect())
}

/// One worker's slice of the job together with its remaining set.
///
/// Files are processed strictly in order and only the file at the front can complete, so
/// the remaining set is always a suffix of the slice.
#[derive(Debug, Clone)]
pub struct Partition {
    files: Vec<std::path::PathBuf>,
    next: usize,
}

impl Partition {
    pub fn new(files: Vec<std::path::PathBuf>) -> Self {
        Self { files, next: 0 }
    }

    pub fn files(&self) -> &[std::path::PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files not yet completed, in processing order.
    pub fn remaining(&self) -> &[std::path::PathBuf] {
        &self.files[self.next..]
    }

    /// Next file to process, `None` once every file completed.
    pub fn current(&self) -> Option<&std::path::Path> {
        self.files.get(self.next).map(|path| path.as_path())
    }

    pub fn mark_completed(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        match self.current() {
            Some(current) if current == path => {
                self.next += 1;
                Ok(())
            }
            current => Err(anyhow!(
                "cannot complete {:?}, next file in partition is {:?}",
                path,
                current
            )),
        }
    }
}

/// Map `src` (under `source_root`) to the same relative location under `target_root`.
pub fn reroot(
    src: &std::path::Path,
    source_root: &std::path::Path,
    target_root: &std::path::Path,
) -> anyhow::Result<std::path::PathBuf> {
    let relative = src.strip_prefix(source_root).map_err(|_| {
        anyhow!(
            "source file {:?} is not located under source root {:?}",
            src,
            source_root
        )
    })?;
    if relative.as_os_str().is_empty() {
        return Err(anyhow!(
            "source file {:?} is the source root itself",
            src
        ));
    }
    if relative
        .components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
    {
        return Err(anyhow!(
            "source file {:?} escapes source root {:?}",
            src,
            source_root
        ));
    }
    Ok(target_root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn paths(count: usize) -> Vec<std::path::PathBuf> {
        (0..count)
            .map(|i| std::path::PathBuf::from(format!("/src/{i}.txt")))
            .collect()
    }

    #[test]
    fn ten_files_two_workers() -> anyhow::Result<()> {
        let parts = partition(&paths(10), 2)?;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 5);
        assert_eq!(parts[1].len(), 5);
        assert_eq!(parts[0][0], std::path::PathBuf::from("/src/0.txt"));
        assert_eq!(parts[1][0], std::path::PathBuf::from("/src/5.txt"));
        Ok(())
    }

    #[test]
    fn trailing_partitions_may_be_empty() -> anyhow::Result<()> {
        // chunk = ceil(5 / 4) = 2 -> 2, 2, 1, 0
        let parts = partition(&paths(5), 4)?;
        let sizes: Vec<_> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1, 0]);
        // chunk = ceil(9 / 4) = 3 -> 3, 3, 3, 0
        let parts = partition(&paths(9), 4)?;
        let sizes: Vec<_> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 0]);
        Ok(())
    }

    #[test]
    fn empty_input() -> anyhow::Result<()> {
        let parts = partition(&[], 4)?;
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| p.is_empty()));
        Ok(())
    }

    #[test]
    fn zero_workers_is_an_error() {
        assert!(partition(&paths(3), 0).is_err());
        let job = TransferJob::new(paths(3), "/src".into(), "/dst".into());
        assert!(job.partition(0).is_err());
        let empty = TransferJob::new(vec![], "/src".into(), "/dst".into());
        assert!(empty.partition(0).is_err());
    }

    #[test]
    fn job_drops_duplicates() {
        let mut files = paths(3);
        files.push(files[1].clone());
        let job = TransferJob::new(files, "/src".into(), "/dst".into());
        assert_eq!(job.len(), 3);
        assert_eq!(job.files(), paths(3).as_slice());
    }

    #[test]
    fn remaining_set_shrinks_in_order() -> anyhow::Result<()> {
        let mut partition = Partition::new(paths(3));
        assert_eq!(partition.remaining().len(), 3);
        partition.mark_completed(std::path::Path::new("/src/0.txt"))?;
        assert_eq!(partition.remaining(), &paths(3)[1..]);
        assert!(
            partition
                .mark_completed(std::path::Path::new("/src/2.txt"))
                .is_err()
        );
        partition.mark_completed(std::path::Path::new("/src/1.txt"))?;
        partition.mark_completed(std::path::Path::new("/src/2.txt"))?;
        assert!(partition.remaining().is_empty());
        assert!(partition.current().is_none());
        Ok(())
    }

    #[test]
    fn reroot_maps_relative_path() -> anyhow::Result<()> {
        let dst = reroot(
            std::path::Path::new("/media/usb/photos/2020/a.jpg"),
            std::path::Path::new("/media/usb"),
            std::path::Path::new("/backup"),
        )?;
        assert_eq!(dst, std::path::PathBuf::from("/backup/photos/2020/a.jpg"));
        Ok(())
    }

    #[test]
    fn reroot_rejects_paths_outside_root() {
        assert!(
            reroot(
                std::path::Path::new("/other/a.jpg"),
                std::path::Path::new("/media/usb"),
                std::path::Path::new("/backup"),
            )
            .is_err()
        );
        assert!(
            reroot(
                std::path::Path::new("/media/usb"),
                std::path::Path::new("/media/usb"),
                std::path::Path::new("/backup"),
            )
            .is_err()
        );
        assert!(
            reroot(
                std::path::Path::new("/media/usb/../../etc/passwd"),
                std::path::Path::new("/media/usb"),
                std::path::Path::new("/backup"),
            )
            .is_err()
        );
    }

    proptest! {
        #[test]
        fn partitions_cover_input_exactly_once(len in 0usize..200, workers in 1usize..16) {
            let files = paths(len);
            let parts = partition(&files, workers).unwrap();
            prop_assert_eq!(parts.len(), workers);
            let bound = chunk_size(len, workers);
            for part in &parts {
                prop_assert!(part.len() <= bound);
            }
            let joined: Vec<_> = parts.into_iter().flatten().collect();
            prop_assert_eq!(joined, files);
        }
    }
}
