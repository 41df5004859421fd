//! Staging reconciliation.
//!
//! A pass turns the current request file into staging marks, then diffs
//! the marked set against the tier's resident set for every (target,
//! tier) pair. The resulting stage/unstage lists are written out as plan
//! files for the external transfer executor; nothing here moves data.

pub mod request;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time;
use tracing::instrument;
use uuid::Uuid;

use sdms::staging::{DataClass, StageTier};

use crate::config::Config;
use crate::database::{SdmsDatabase, StageCandidate};
use crate::error::{ServerError, ServerResult};
use crate::{State, StateInner};
use request::{load_directives, StageDirective};

/// One reconciliation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePair {
    pub target: DataClass,
    pub tier: StageTier,
}

impl StagePair {
    /// Every (target, tier) combination.
    pub fn all() -> Vec<StagePair> {
        DataClass::all()
            .iter()
            .flat_map(|&target| {
                StageTier::all()
                    .iter()
                    .map(move |&tier| StagePair { target, tier })
            })
            .collect()
    }
}

/// The container-staging heuristic.
#[derive(Debug, Clone, Copy)]
pub struct ContainerPolicy {
    /// Fraction of a container's members that must be selected.
    pub threshold: f64,

    /// Whether a fraction exactly at the threshold stages the container.
    pub inclusive: bool,
}

impl ContainerPolicy {
    /// Whether a container with `selected` of `total` members wanted
    /// should be staged wholesale.
    pub fn stages_wholesale(&self, selected: u64, total: u64) -> bool {
        if total == 0 {
            return false;
        }

        let fraction = selected as f64 / total as f64;
        if self.inclusive {
            fraction >= self.threshold
        } else {
            fraction > self.threshold
        }
    }
}

/// The point-in-time output of reconciling one (target, tier) pair.
#[derive(Debug, Clone, Serialize)]
pub struct StagePlan {
    /// Identifier of the pass that produced this plan.
    pub pass_id: Uuid,

    pub target: DataClass,
    pub tier: StageTier,
    pub generated_at: DateTime<Utc>,

    /// Canonical paths to stage individually.
    pub stage_files: BTreeSet<String>,

    /// Containers to stage wholesale instead of their members.
    pub stage_containers: BTreeSet<String>,

    /// Canonical paths whose disk copy is no longer selected.
    pub unstage: BTreeSet<String>,
}

/// Diffs the marked set against the resident set.
///
/// The two outputs are disjoint by construction: a path is either marked
/// and not resident, or resident and not marked.
pub fn compute_delta(
    marked: &HashSet<String>,
    resident: &HashSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let to_stage = marked.difference(resident).cloned().collect();
    let to_unstage = resident.difference(marked).cloned().collect();

    (to_stage, to_unstage)
}

/// Applies the container heuristic to a to-stage set.
///
/// Containers with enough selected members replace those members in the
/// output; everything else stays an individual file.
pub fn plan_containers(
    to_stage: &BTreeSet<String>,
    membership: &HashMap<String, Option<String>>,
    totals: &HashMap<String, u64>,
    policy: &ContainerPolicy,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut selected: HashMap<&str, u64> = HashMap::new();
    for path in to_stage {
        if let Some(Some(container)) = membership.get(path) {
            *selected.entry(container.as_str()).or_default() += 1;
        }
    }

    let mut containers = BTreeSet::new();
    for (container, count) in selected {
        let total = totals.get(container).copied().unwrap_or(0);
        if policy.stages_wholesale(count, total) {
            containers.insert(container.to_owned());
        }
    }

    let files = to_stage
        .iter()
        .filter(|path| match membership.get(*path) {
            Some(Some(container)) => !containers.contains(container),
            _ => true,
        })
        .cloned()
        .collect();

    (files, containers)
}

/// Runs reconciliation passes periodically.
pub async fn run_stager(config: Config) {
    let interval = config.staging.interval;

    if interval == Duration::ZERO {
        // disabled
        return;
    }

    loop {
        // We don't stop even if it errors
        if let Err(e) = run_staging_pass_once(config.clone()).await {
            tracing::warn!("Staging pass failed: {}", e);
        }

        time::sleep(interval).await;
    }
}

/// Runs one reconciliation pass.
#[instrument(skip_all)]
pub async fn run_staging_pass_once(config: Config) -> ServerResult<()> {
    let state = StateInner::new(config).await;
    let pass_id = Uuid::new_v4();

    tracing::info!(%pass_id, "Running staging pass...");

    let directives = load_directives(&state.config.staging.request_file).await?;
    tracing::info!("Compiled {} directives", directives.len());

    // Reset must complete before any marking begins, else a racing mark
    // could be wiped by a stale reset.
    let db = state.database().await?;
    for pair in StagePair::all() {
        db.reset_stage_marks(pair.target, pair.tier).await?;
    }

    apply_directives(&state, &directives).await?;

    let reconcile_limit = Arc::new(Semaphore::new(4));
    let futures: Vec<_> = StagePair::all()
        .into_iter()
        .map(|pair| {
            let state = state.clone();
            let reconcile_limit = reconcile_limit.clone();

            async move {
                let permit = reconcile_limit
                    .acquire()
                    .await
                    .map_err(ServerError::listing_error)?;
                let result = reconcile_pair(&state, pass_id, pair).await;
                drop(permit);
                result.map(|plan| (pair, plan))
            }
        })
        .collect();

    // A failing pair must not block its siblings.
    for result in join_all(futures).await {
        match result {
            Ok((pair, plan)) => tracing::info!(
                target = %pair.target,
                tier = %pair.tier,
                stage_files = plan.stage_files.len(),
                stage_containers = plan.stage_containers.len(),
                unstage = plan.unstage.len(),
                "Reconciled"
            ),
            Err(e) => tracing::warn!("Reconciliation failed: {}", e),
        }
    }

    Ok(())
}

#[instrument(skip_all)]
async fn apply_directives(state: &State, directives: &[StageDirective]) -> ServerResult<()> {
    let db = state.database().await?;

    for directive in directives {
        let candidates = db.canonical_candidates(directive.target).await?;
        let matched: Vec<StageCandidate> = candidates
            .into_iter()
            .filter(|candidate| directive.matches(&candidate.star_details.0))
            .collect();

        tracing::info!(
            target = %directive.target,
            tier = %directive.tier,
            matched = matched.len(),
            "Applied directive"
        );

        db.set_stage_marks(directive.target, directive.tier, &matched)
            .await?;
    }

    Ok(())
}

#[instrument(skip_all, fields(target = %pair.target, tier = %pair.tier))]
async fn reconcile_pair(state: &State, pass_id: Uuid, pair: StagePair) -> ServerResult<StagePlan> {
    let db = state.database().await?;

    // The two reads are not atomic. The resident set lags the walkers
    // anyway, so the next pass corrects whatever this one missed.
    let marked = db.marked_paths(pair.target, pair.tier).await?;
    let resident = db.resident_paths_on_tier(pair.target, pair.tier).await?;

    let (to_stage, to_unstage) = compute_delta(&marked, &resident);

    let membership: HashMap<String, Option<String>> = db
        .canonical_candidates(pair.target)
        .await?
        .into_iter()
        .map(|candidate| (candidate.file_path, candidate.container_path))
        .collect();

    let mut totals: HashMap<String, u64> = HashMap::new();
    for container in membership.values().flatten() {
        if !totals.contains_key(container) {
            let count = db.container_member_count(container, pair.target).await?;
            totals.insert(container.clone(), count);
        }
    }

    let policy = ContainerPolicy {
        threshold: state.config.staging.container_threshold,
        inclusive: state.config.staging.container_threshold_inclusive,
    };
    let (stage_files, stage_containers) = plan_containers(&to_stage, &membership, &totals, &policy);

    db.flag_pending_unstage(pair.target, pair.tier, &to_unstage)
        .await?;

    let plan = StagePlan {
        pass_id,
        target: pair.target,
        tier: pair.tier,
        generated_at: Utc::now(),
        stage_files,
        stage_containers,
        unstage: to_unstage,
    };

    write_plan(state, &plan).await?;

    Ok(plan)
}

async fn write_plan(state: &State, plan: &StagePlan) -> ServerResult<()> {
    let dir = &state.config.staging.plan_dir;
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(format!("stage-plan-{}-{}.json", plan.target, plan.tier));
    let bytes = serde_json::to_vec_pretty(plan)?;
    tokio::fs::write(&path, bytes).await?;

    tracing::info!("Wrote {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compute_delta() {
        let marked = paths(&["a", "b", "c"]);
        let resident = paths(&["b", "c", "d"]);

        let (to_stage, to_unstage) = compute_delta(&marked, &resident);

        assert_eq!(BTreeSet::from(["a".to_owned()]), to_stage);
        assert_eq!(BTreeSet::from(["d".to_owned()]), to_unstage);
    }

    #[test]
    fn test_delta_outputs_are_disjoint() {
        let marked = paths(&["a", "b"]);
        let resident = paths(&["b", "c"]);

        let (to_stage, to_unstage) = compute_delta(&marked, &resident);

        assert!(to_stage.is_disjoint(&to_unstage));
    }

    #[test]
    fn test_delta_is_empty_when_sets_agree() {
        let marked = paths(&["a", "b"]);

        let (to_stage, to_unstage) = compute_delta(&marked, &marked.clone());

        assert!(to_stage.is_empty());
        assert!(to_unstage.is_empty());
    }

    #[test]
    fn test_container_threshold_boundary() {
        let exclusive = ContainerPolicy {
            threshold: 0.25,
            inclusive: false,
        };
        let inclusive = ContainerPolicy {
            threshold: 0.25,
            inclusive: true,
        };

        // 12 of 40 is 30%
        assert!(exclusive.stages_wholesale(12, 40));

        // 10 of 40 is exactly the threshold
        assert!(!exclusive.stages_wholesale(10, 40));
        assert!(inclusive.stages_wholesale(10, 40));

        assert!(!exclusive.stages_wholesale(0, 0));
    }

    #[test]
    fn test_plan_containers_replaces_members() {
        let container = "/archive/Run10/148.tar".to_owned();

        let mut membership = HashMap::new();
        let mut to_stage = BTreeSet::new();
        for i in 0..12 {
            let path = format!("Run10/member-{i}.picoDst.root");
            membership.insert(path.clone(), Some(container.clone()));
            to_stage.insert(path);
        }
        membership.insert("Run10/loose.picoDst.root".to_owned(), None);
        to_stage.insert("Run10/loose.picoDst.root".to_owned());

        let totals = HashMap::from([(container.clone(), 40u64)]);
        let policy = ContainerPolicy {
            threshold: 0.25,
            inclusive: false,
        };

        let (files, containers) = plan_containers(&to_stage, &membership, &totals, &policy);

        assert_eq!(BTreeSet::from([container]), containers);
        assert_eq!(
            BTreeSet::from(["Run10/loose.picoDst.root".to_owned()]),
            files
        );
    }

    #[test]
    fn test_plan_containers_below_threshold_keeps_files() {
        let container = "/archive/Run10/148.tar".to_owned();

        let mut membership = HashMap::new();
        let mut to_stage = BTreeSet::new();
        for i in 0..5 {
            let path = format!("Run10/member-{i}.picoDst.root");
            membership.insert(path.clone(), Some(container.clone()));
            to_stage.insert(path);
        }

        let totals = HashMap::from([(container, 40u64)]);
        let policy = ContainerPolicy {
            threshold: 0.25,
            inclusive: false,
        };

        let (files, containers) = plan_containers(&to_stage, &membership, &totals, &policy);

        assert!(containers.is_empty());
        assert_eq!(5, files.len());
    }
}
