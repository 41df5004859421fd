//! Serving-node replica crawling.
//!
//! The crawler walks the node's namespace, compares what it sees against
//! the catalog's resident set, and writes the outcome back as replica
//! entries. Promotion of new files (and eviction of missing ones) happens
//! downstream, after an audit window.

pub mod walker;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::anyhow;
use tokio::task;
use tracing::instrument;

use sdms::staging::DataClass;

use crate::config::{Config, NodeConfig};
use crate::database::entity::replica_entry::ReplicaState;
use crate::database::{NodeTelemetry, ReplicaDoc, SdmsDatabase};
use crate::error::{ServerError, ServerResult};
use crate::{State, StateInner};
use walker::{data_partition_usage, walk_working_dir, Observation};

/// Issue marker on replica entries backed by a dangling namespace link.
const ISSUE_BROKEN_LINK: &str = "brokenLink";

/// The outcome of comparing a walk against the resident set.
#[derive(Debug, Default)]
pub struct Classified {
    /// Resident files confirmed on disk.
    pub matched: usize,

    /// Healthy files on disk that the catalog does not know about.
    pub new: Vec<Observation>,

    /// Namespace entries whose backing file is gone.
    pub broken: Vec<Observation>,

    /// Resident paths not accounted for by the walk.
    pub missing: Vec<String>,
}

/// Classifies walk observations against the catalog's resident set.
///
/// A broken link consumes its resident entry too: the file surfaces as a
/// single missing entry with an issue marker, not as missing twice.
pub fn classify(resident: &HashSet<String>, observations: Vec<Observation>) -> Classified {
    let mut unaccounted: HashSet<String> = resident.clone();
    let mut classified = Classified::default();

    for observation in observations {
        match &observation {
            Observation::File { file_path, .. } => {
                if unaccounted.remove(file_path) {
                    classified.matched += 1;
                } else {
                    classified.new.push(observation);
                }
            }
            Observation::Broken { file_path, .. } => {
                unaccounted.remove(file_path);
                classified.broken.push(observation);
            }
        }
    }

    classified.missing = unaccounted.into_iter().collect();
    classified.missing.sort();

    classified
}

fn node_name(config: &NodeConfig) -> ServerResult<String> {
    if let Some(name) = &config.name {
        return Ok(name.clone());
    }

    sysinfo::System::host_name()
        .and_then(|host| host.split('.').next().map(str::to_owned))
        .ok_or_else(|| ServerError::ConfigError(anyhow!("cannot determine the node name")))
}

/// Runs one full replica crawl of this node.
pub async fn run_replica_crawl(config: Config) -> ServerResult<()> {
    let state = StateInner::new(config).await;

    crawl_node(&state).await
}

/// Walks every configured target on this node and records the outcome.
#[instrument(skip_all)]
async fn crawl_node(state: &State) -> ServerResult<()> {
    let config = &state.config.node;
    let node = node_name(config)?;

    for (&target, base_folder) in &config.base_folders {
        let work_dir = config.namespace_prefix.join(base_folder);

        // Another target's tree may be nested inside ours.
        let ignore: Vec<PathBuf> = config
            .base_folders
            .iter()
            .filter(|(other, _)| **other != target)
            .map(|(_, folder)| config.namespace_prefix.join(folder))
            .collect();

        crawl_target(state, &node, target, work_dir, ignore).await?;
    }

    update_node_telemetry(state, &node).await?;

    Ok(())
}

#[instrument(skip_all, fields(%target))]
async fn crawl_target(
    state: &State,
    node: &str,
    target: DataClass,
    work_dir: PathBuf,
    ignore: Vec<PathBuf>,
) -> ServerResult<()> {
    let db = state.database().await?;
    let tier = state.config.node.tier;

    let resident = db.resident_paths_on_node(node, target, tier).await?;

    let observations = if tokio::fs::metadata(&work_dir).await.is_err() {
        tracing::warn!(
            "Working directory {} is gone, all {} resident files are missing",
            work_dir.display(),
            resident.len()
        );

        Vec::new()
    } else {
        let work_dir = work_dir.clone();
        task::spawn_blocking(move || walk_working_dir(&work_dir, &ignore))
            .await
            .map_err(ServerError::listing_error)??
    };

    let classified = classify(&resident, observations);

    tracing::info!(
        matched = classified.matched,
        new = classified.new.len(),
        missing = classified.missing.len(),
        broken = classified.broken.len(),
        "Walked {}",
        work_dir.display()
    );

    let mut docs = Vec::new();

    for observation in classified.new {
        if let Observation::File {
            file_path,
            full_path,
            size,
            disk,
        } = observation
        {
            docs.push(ReplicaDoc {
                node: node.to_owned(),
                target,
                tier,
                file_path,
                full_path,
                size: Some(size),
                disk,
                state: ReplicaState::New,
                issue: None,
            });
        }
    }

    for observation in classified.broken {
        if let Observation::Broken {
            file_path,
            full_path,
        } = observation
        {
            docs.push(ReplicaDoc {
                node: node.to_owned(),
                target,
                tier,
                file_path,
                full_path,
                size: None,
                disk: None,
                state: ReplicaState::Missing,
                issue: Some(ISSUE_BROKEN_LINK.to_owned()),
            });
        }
    }

    for file_path in classified.missing {
        let full_path = work_dir.join(&file_path).to_string_lossy().into_owned();
        docs.push(ReplicaDoc {
            node: node.to_owned(),
            target,
            tier,
            file_path,
            full_path,
            size: None,
            disk: None,
            state: ReplicaState::Missing,
            issue: None,
        });
    }

    // Supersede the previous walk's outcome for this pair.
    db.retire_walk_entries(node, target, tier).await?;
    db.insert_replica_entries(docs).await
}

#[instrument(skip_all)]
async fn update_node_telemetry(state: &State, node: &str) -> ServerResult<()> {
    let db = state.database().await?;

    let prefix = state.config.node.data_mount_prefix.clone();
    let usage = task::spawn_blocking(move || data_partition_usage(&prefix))
        .await
        .map_err(ServerError::listing_error)?;

    db.upsert_data_server(NodeTelemetry {
        node: node.to_owned(),
        free_space: usage.free as i64,
        used_space: usage.used as i64,
        total_space: usage.total as i64,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> Observation {
        Observation::File {
            file_path: path.to_owned(),
            full_path: format!("/export/data/xrd/ns/star/picodsts/{path}"),
            size: 1,
            disk: Some("data3".to_owned()),
        }
    }

    fn broken(path: &str) -> Observation {
        Observation::Broken {
            file_path: path.to_owned(),
            full_path: format!("/export/data/xrd/ns/star/picodsts/{path}"),
        }
    }

    #[test]
    fn test_classify_partitions_the_walk() {
        let resident: HashSet<String> = ["Run10/a.root", "Run10/b.root", "Run10/c.root"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let classified = classify(&resident, vec![file("Run10/a.root"), file("Run10/d.root")]);

        assert_eq!(1, classified.matched);
        assert_eq!(1, classified.new.len());
        assert_eq!("Run10/d.root", classified.new[0].file_path());
        assert_eq!(
            vec!["Run10/b.root".to_owned(), "Run10/c.root".to_owned()],
            classified.missing
        );
        assert!(classified.broken.is_empty());
    }

    #[test]
    fn test_classify_broken_link_consumes_resident_entry() {
        let resident: HashSet<String> =
            ["Run10/a.root".to_owned(), "Run10/b.root".to_owned()].into();

        let classified = classify(&resident, vec![file("Run10/a.root"), broken("Run10/b.root")]);

        assert_eq!(1, classified.matched);
        assert_eq!(1, classified.broken.len());

        // b must not additionally count as missing
        assert!(classified.missing.is_empty());
    }

    #[test]
    fn test_classify_empty_walk_marks_everything_missing() {
        let resident: HashSet<String> =
            ["Run10/a.root".to_owned(), "Run10/b.root".to_owned()].into();

        let classified = classify(&resident, Vec::new());

        assert_eq!(0, classified.matched);
        assert_eq!(2, classified.missing.len());
    }
}
