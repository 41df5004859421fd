//! Namespace walking on a serving node.
//!
//! The staged files live under a namespace tree whose entries are
//! symbolic links into the node's data partitions. Walking the tree
//! therefore distinguishes healthy links from dangling ones, and the link
//! target tells us which data disk backs a file.

use std::fs;
use std::path::{Component, Path, PathBuf};

use sysinfo::Disks;
use walkdir::WalkDir;

use crate::error::{ServerError, ServerResult};

/// One file observed in a namespace walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A healthy file.
    File {
        /// Canonical relative path below the working directory.
        file_path: String,

        /// Full local path of the namespace entry.
        full_path: String,

        /// Size in bytes.
        size: i64,

        /// Data disk backing the namespace link, if the entry is one.
        disk: Option<String>,
    },

    /// A namespace entry whose backing file is gone.
    Broken {
        /// Canonical relative path below the working directory.
        file_path: String,

        /// Full local path of the namespace entry.
        full_path: String,
    },
}

impl Observation {
    /// The canonical relative path of the observation.
    pub fn file_path(&self) -> &str {
        match self {
            Self::File { file_path, .. } => file_path,
            Self::Broken { file_path, .. } => file_path,
        }
    }
}

/// Walks one working directory, returning every file found below it.
///
/// Directories in `ignore` are not descended into. They hold another
/// target's working tree nested inside this one.
pub fn walk_working_dir(work_dir: &Path, ignore: &[PathBuf]) -> ServerResult<Vec<Observation>> {
    let mut observations = Vec::new();

    let walker = WalkDir::new(work_dir)
        .into_iter()
        .filter_entry(|entry| !ignore.iter().any(|dir| entry.path() == dir));

    for entry in walker {
        let entry = entry.map_err(ServerError::listing_error)?;
        if entry.file_type().is_dir() {
            continue;
        }

        let full_path = entry.path();
        let file_path = full_path
            .strip_prefix(work_dir)
            .unwrap_or(full_path)
            .to_string_lossy()
            .into_owned();

        // stat() follows the link, so a dangling entry surfaces here.
        match fs::metadata(full_path) {
            Ok(metadata) => observations.push(Observation::File {
                file_path,
                full_path: full_path.to_string_lossy().into_owned(),
                size: metadata.len() as i64,
                disk: backing_disk(full_path),
            }),
            Err(_) => observations.push(Observation::Broken {
                file_path,
                full_path: full_path.to_string_lossy().into_owned(),
            }),
        }
    }

    Ok(observations)
}

/// Returns the data disk a namespace link points into.
///
/// Link targets look like `/export/data3/xrd/...`; the second path
/// component names the disk.
fn backing_disk(path: &Path) -> Option<String> {
    let target = fs::read_link(path).ok()?;

    target
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .nth(1)
        .map(str::to_owned)
}

/// Aggregate capacity of the data partitions on this node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub free: u64,
    pub used: u64,
    pub total: u64,
}

/// Sums the capacity of every mounted partition under the data prefix.
pub fn data_partition_usage(mount_prefix: &str) -> DiskUsage {
    let disks = Disks::new_with_refreshed_list();

    let mut usage = DiskUsage::default();
    for disk in disks.list() {
        if disk.mount_point().starts_with(mount_prefix) {
            usage.free += disk.available_space();
            usage.total += disk.total_space();
        }
    }
    usage.used = usage.total.saturating_sub(usage.free);

    usage
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sdms-walker-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_walk_reports_relative_paths() {
        let dir = scratch_dir("relative");
        fs::create_dir_all(dir.join("Run10/AuAu")).unwrap();
        fs::write(dir.join("Run10/AuAu/a.picoDst.root"), b"xxxx").unwrap();

        let observations = walk_working_dir(&dir, &[]).unwrap();

        assert_eq!(1, observations.len());
        match &observations[0] {
            Observation::File {
                file_path, size, ..
            } => {
                assert_eq!("Run10/AuAu/a.picoDst.root", file_path);
                assert_eq!(4, *size);
            }
            other => panic!("unexpected observation: {:?}", other),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_flags_dangling_links() {
        let dir = scratch_dir("dangling");
        fs::create_dir_all(dir.join("Run10")).unwrap();
        std::os::unix::fs::symlink(
            "/export/data3/gone/a.picoDst.root",
            dir.join("Run10/a.picoDst.root"),
        )
        .unwrap();

        let observations = walk_working_dir(&dir, &[]).unwrap();

        assert_eq!(
            vec![Observation::Broken {
                file_path: "Run10/a.picoDst.root".to_owned(),
                full_path: dir.join("Run10/a.picoDst.root").to_string_lossy().into_owned(),
            }],
            observations
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_walk_skips_ignored_subtrees() {
        let dir = scratch_dir("ignore");
        fs::create_dir_all(dir.join("JetPicoDsts")).unwrap();
        fs::write(dir.join("JetPicoDsts/b.picoDstJet.root"), b"x").unwrap();
        fs::write(dir.join("a.picoDst.root"), b"x").unwrap();

        let ignore = vec![dir.join("JetPicoDsts")];
        let observations = walk_working_dir(&dir, &ignore).unwrap();

        assert_eq!(1, observations.len());
        assert_eq!("a.picoDst.root", observations[0].file_path());

        fs::remove_dir_all(&dir).unwrap();
    }
}
