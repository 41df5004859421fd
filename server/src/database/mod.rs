//! The catalog database.

pub mod entity;
pub mod migration;

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QuerySelect,
};
use sdms::metadata::StructuredMetadata;
use sdms::staging::{DataClass, StageTier};

use crate::error::{ServerError, ServerResult};
use entity::archive_file::{self, ArchiveFileKind};
use entity::canonical_file;
use entity::data_server;
use entity::duplicate_file;
use entity::replica_entry::{self, ReplicaState};
use entity::staging_mark;
use entity::Json;

/// Outcome of recording an archive observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// The path was not in the catalog and a new record was created.
    Inserted,

    /// The path was already catalogued; only `last_seen` was refreshed.
    AlreadyKnown,
}

/// A logical data file ready for catalog ingestion.
#[derive(Debug, Clone)]
pub struct CanonicalDoc {
    /// Canonical relative path, starting at the `Run*` component.
    pub file_path: String,

    /// Full archive path of the physical occurrence.
    pub full_path: String,

    /// Size in bytes.
    pub size: i64,

    /// Data class of the file.
    pub data_class: DataClass,

    /// Whether the occurrence lives inside a tar container.
    pub in_container: bool,

    /// Full archive path of the containing tar, if any.
    pub container_path: Option<String>,

    /// Metadata resolved from the canonical relative path.
    pub star_details: StructuredMetadata,
}

/// Counts from one catalog ingestion batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSummary {
    /// Documents that became new canonical records.
    pub inserted: usize,

    /// Documents routed to the duplicate ledger.
    pub duplicated: usize,
}

/// A catalogued file as seen by directive evaluation.
#[derive(FromQueryResult, Debug, Clone)]
pub struct StageCandidate {
    pub id: i64,
    pub file_path: String,
    pub container_path: Option<String>,
    pub star_details: Json<StructuredMetadata>,
}

/// One replica observation produced by a node walk.
#[derive(Debug, Clone)]
pub struct ReplicaDoc {
    pub node: String,
    pub target: DataClass,
    pub tier: StageTier,
    pub file_path: String,
    pub full_path: String,
    pub size: Option<i64>,
    pub disk: Option<String>,
    pub state: ReplicaState,
    pub issue: Option<String>,
}

/// Capacity snapshot of one serving node.
#[derive(Debug, Clone)]
pub struct NodeTelemetry {
    pub node: String,
    pub free_space: i64,
    pub used_space: i64,
    pub total_space: i64,
}

#[derive(FromQueryResult)]
struct PathOnly {
    file_path: String,
}

#[derive(FromQueryResult)]
struct IdAndPath {
    id: i64,
    file_path: String,
}

/// The catalog database trait.
#[async_trait]
pub trait SdmsDatabase: Send + Sync {
    /// Records one archive observation, creating the record on first
    /// sight and refreshing `last_seen` otherwise.
    async fn record_archive_file(
        &self,
        full_path: &str,
        size: i64,
        kind: ArchiveFileKind,
    ) -> ServerResult<RecordStatus>;

    /// Ingests a batch of logical files, routing repeated canonical
    /// paths to the duplicate ledger.
    async fn ingest_canonical_batch(&self, docs: Vec<CanonicalDoc>) -> ServerResult<IngestSummary>;

    /// Returns all catalogued files of a data class.
    async fn canonical_candidates(&self, target: DataClass) -> ServerResult<Vec<StageCandidate>>;

    /// Counts the catalogued members of one container.
    async fn container_member_count(
        &self,
        container_path: &str,
        target: DataClass,
    ) -> ServerResult<u64>;

    /// Clears the `marked` flag for every file of a (target, tier) pair.
    ///
    /// `pending_unstage` is left untouched so removal intent survives
    /// the reset.
    async fn reset_stage_marks(&self, target: DataClass, tier: StageTier) -> ServerResult<()>;

    /// Marks the given files as wanted on a tier.
    ///
    /// Re-marking a file clears any pending-unstage flag left by an
    /// earlier pass; the three mark states are mutually exclusive.
    async fn set_stage_marks(
        &self,
        target: DataClass,
        tier: StageTier,
        files: &[StageCandidate],
    ) -> ServerResult<()>;

    /// Returns the canonical paths currently marked for a (target, tier) pair.
    async fn marked_paths(
        &self,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<HashSet<String>>;

    /// Returns the canonical paths resident on a tier, across all nodes.
    async fn resident_paths_on_tier(
        &self,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<HashSet<String>>;

    /// Returns the canonical paths resident on one node.
    async fn resident_paths_on_node(
        &self,
        node: &str,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<HashSet<String>>;

    /// Drops the previous walk's transient entries for one node and
    /// (target, tier) pair.
    ///
    /// Resident rows are untouched; only `New` and `Missing` rows are
    /// superseded by the next walk's outcome.
    async fn retire_walk_entries(
        &self,
        node: &str,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<()>;

    /// Inserts the replica observations of one walk.
    async fn insert_replica_entries(&self, entries: Vec<ReplicaDoc>) -> ServerResult<()>;

    /// Flags resident files that fell out of the marked set for removal.
    async fn flag_pending_unstage(
        &self,
        target: DataClass,
        tier: StageTier,
        paths: &BTreeSet<String>,
    ) -> ServerResult<()>;

    /// Upserts the capacity snapshot of one serving node.
    async fn upsert_data_server(&self, telemetry: NodeTelemetry) -> ServerResult<()>;
}

#[async_trait]
impl SdmsDatabase for DatabaseConnection {
    async fn record_archive_file(
        &self,
        full_path: &str,
        size: i64,
        kind: ArchiveFileKind,
    ) -> ServerResult<RecordStatus> {
        let now = Utc::now();

        let model = archive_file::ActiveModel {
            full_path: Set(full_path.to_string()),
            size: Set(size),
            kind: Set(kind),
            first_seen: Set(now),
            last_seen: Set(now),
            ..Default::default()
        };

        let insertion = archive_file::Entity::insert(model)
            .on_conflict(
                OnConflict::column(archive_file::Column::FullPath)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(self)
            .await;

        match insertion {
            Ok(_) => Ok(RecordStatus::Inserted),
            Err(DbErr::RecordNotInserted) => {
                archive_file::Entity::update_many()
                    .col_expr(archive_file::Column::LastSeen, Expr::value(now))
                    .filter(archive_file::Column::FullPath.eq(full_path))
                    .exec(self)
                    .await
                    .map_err(ServerError::database_error)?;

                Ok(RecordStatus::AlreadyKnown)
            }
            Err(e) => Err(ServerError::database_error(e)),
        }
    }

    async fn ingest_canonical_batch(&self, docs: Vec<CanonicalDoc>) -> ServerResult<IngestSummary> {
        let mut summary = IngestSummary::default();
        let now = Utc::now();

        for doc in docs {
            let model = canonical_file::ActiveModel {
                file_path: Set(doc.file_path.clone()),
                full_path: Set(doc.full_path.clone()),
                size: Set(doc.size),
                data_class: Set(doc.data_class.as_str().to_string()),
                in_container: Set(doc.in_container),
                container_path: Set(doc.container_path.clone()),
                star_details: Set(Json(doc.star_details.clone())),
                created_at: Set(now),
                ..Default::default()
            };

            let insertion = canonical_file::Entity::insert(model)
                .on_conflict(
                    OnConflict::column(canonical_file::Column::FilePath)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(self)
                .await;

            match insertion {
                Ok(_) => {
                    summary.inserted += 1;
                }
                Err(DbErr::RecordNotInserted) => {
                    let duplicate = duplicate_file::ActiveModel {
                        file_path: Set(doc.file_path),
                        full_path: Set(doc.full_path),
                        size: Set(doc.size),
                        data_class: Set(doc.data_class.as_str().to_string()),
                        in_container: Set(doc.in_container),
                        container_path: Set(doc.container_path),
                        star_details: Set(Json(doc.star_details)),
                        created_at: Set(now),
                        ..Default::default()
                    };

                    duplicate_file::Entity::insert(duplicate)
                        .exec(self)
                        .await
                        .map_err(ServerError::database_error)?;

                    summary.duplicated += 1;
                }
                Err(e) => return Err(ServerError::database_error(e)),
            }
        }

        Ok(summary)
    }

    async fn canonical_candidates(&self, target: DataClass) -> ServerResult<Vec<StageCandidate>> {
        canonical_file::Entity::find()
            .select_only()
            .column(canonical_file::Column::Id)
            .column(canonical_file::Column::FilePath)
            .column(canonical_file::Column::ContainerPath)
            .column(canonical_file::Column::StarDetails)
            .filter(canonical_file::Column::DataClass.eq(target.as_str()))
            .into_model::<StageCandidate>()
            .all(self)
            .await
            .map_err(ServerError::database_error)
    }

    async fn container_member_count(
        &self,
        container_path: &str,
        target: DataClass,
    ) -> ServerResult<u64> {
        canonical_file::Entity::find()
            .filter(canonical_file::Column::ContainerPath.eq(container_path))
            .filter(canonical_file::Column::DataClass.eq(target.as_str()))
            .count(self)
            .await
            .map_err(ServerError::database_error)
    }

    async fn reset_stage_marks(&self, target: DataClass, tier: StageTier) -> ServerResult<()> {
        staging_mark::Entity::update_many()
            .col_expr(staging_mark::Column::Marked, Expr::value(false))
            .col_expr(staging_mark::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(staging_mark::Column::Target.eq(target.as_str()))
            .filter(staging_mark::Column::Tier.eq(tier.as_str()))
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn set_stage_marks(
        &self,
        target: DataClass,
        tier: StageTier,
        files: &[StageCandidate],
    ) -> ServerResult<()> {
        if files.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let models = files.iter().map(|file| staging_mark::ActiveModel {
            canonical_file_id: Set(file.id),
            file_path: Set(file.file_path.clone()),
            target: Set(target.as_str().to_string()),
            tier: Set(tier.as_str().to_string()),
            marked: Set(true),
            pending_unstage: Set(false),
            updated_at: Set(now),
            ..Default::default()
        });

        staging_mark::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    staging_mark::Column::CanonicalFileId,
                    staging_mark::Column::Tier,
                ])
                .update_columns([
                    staging_mark::Column::Marked,
                    staging_mark::Column::PendingUnstage,
                    staging_mark::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn marked_paths(
        &self,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<HashSet<String>> {
        let rows = staging_mark::Entity::find()
            .select_only()
            .column(staging_mark::Column::FilePath)
            .filter(staging_mark::Column::Target.eq(target.as_str()))
            .filter(staging_mark::Column::Tier.eq(tier.as_str()))
            .filter(staging_mark::Column::Marked.eq(true))
            .into_model::<PathOnly>()
            .all(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(rows.into_iter().map(|r| r.file_path).collect())
    }

    async fn resident_paths_on_tier(
        &self,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<HashSet<String>> {
        let rows = replica_entry::Entity::find()
            .select_only()
            .column(replica_entry::Column::FilePath)
            .filter(replica_entry::Column::Target.eq(target.as_str()))
            .filter(replica_entry::Column::Tier.eq(tier.as_str()))
            .filter(replica_entry::Column::State.eq(ReplicaState::Resident))
            .into_model::<PathOnly>()
            .all(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(rows.into_iter().map(|r| r.file_path).collect())
    }

    async fn resident_paths_on_node(
        &self,
        node: &str,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<HashSet<String>> {
        let rows = replica_entry::Entity::find()
            .select_only()
            .column(replica_entry::Column::FilePath)
            .filter(replica_entry::Column::Node.eq(node))
            .filter(replica_entry::Column::Target.eq(target.as_str()))
            .filter(replica_entry::Column::Tier.eq(tier.as_str()))
            .filter(replica_entry::Column::State.eq(ReplicaState::Resident))
            .into_model::<PathOnly>()
            .all(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(rows.into_iter().map(|r| r.file_path).collect())
    }

    async fn retire_walk_entries(
        &self,
        node: &str,
        target: DataClass,
        tier: StageTier,
    ) -> ServerResult<()> {
        replica_entry::Entity::delete_many()
            .filter(replica_entry::Column::Node.eq(node))
            .filter(replica_entry::Column::Target.eq(target.as_str()))
            .filter(replica_entry::Column::Tier.eq(tier.as_str()))
            .filter(
                replica_entry::Column::State
                    .is_in([ReplicaState::New, ReplicaState::Missing]),
            )
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn insert_replica_entries(&self, entries: Vec<ReplicaDoc>) -> ServerResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let models = entries.into_iter().map(|doc| replica_entry::ActiveModel {
            node: Set(doc.node),
            target: Set(doc.target.as_str().to_string()),
            tier: Set(doc.tier.as_str().to_string()),
            file_path: Set(doc.file_path),
            full_path: Set(doc.full_path),
            size: Set(doc.size),
            disk: Set(doc.disk),
            state: Set(doc.state),
            issue: Set(doc.issue),
            observed_at: Set(now),
            ..Default::default()
        });

        replica_entry::Entity::insert_many(models)
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn flag_pending_unstage(
        &self,
        target: DataClass,
        tier: StageTier,
        paths: &BTreeSet<String>,
    ) -> ServerResult<()> {
        if paths.is_empty() {
            return Ok(());
        }

        // A resident file staged under no current directive has no mark
        // row yet, so the flag is an upsert, not an update.
        let files = canonical_file::Entity::find()
            .select_only()
            .column(canonical_file::Column::Id)
            .column(canonical_file::Column::FilePath)
            .filter(canonical_file::Column::DataClass.eq(target.as_str()))
            .filter(canonical_file::Column::FilePath.is_in(paths.iter().cloned()))
            .into_model::<IdAndPath>()
            .all(self)
            .await
            .map_err(ServerError::database_error)?;

        if files.len() < paths.len() {
            tracing::warn!(
                "{} unstage candidates have no canonical record",
                paths.len() - files.len()
            );
        }

        if files.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let models = files.into_iter().map(|file| staging_mark::ActiveModel {
            canonical_file_id: Set(file.id),
            file_path: Set(file.file_path),
            target: Set(target.as_str().to_string()),
            tier: Set(tier.as_str().to_string()),
            marked: Set(false),
            pending_unstage: Set(true),
            updated_at: Set(now),
            ..Default::default()
        });

        staging_mark::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    staging_mark::Column::CanonicalFileId,
                    staging_mark::Column::Tier,
                ])
                .update_columns([
                    staging_mark::Column::PendingUnstage,
                    staging_mark::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn upsert_data_server(&self, telemetry: NodeTelemetry) -> ServerResult<()> {
        let now = Utc::now();

        let model = data_server::ActiveModel {
            node: Set(telemetry.node),
            free_space: Set(telemetry.free_space),
            used_space: Set(telemetry.used_space),
            total_space: Set(telemetry.total_space),
            last_walker_run: Set(now),
            active: Set(true),
            ..Default::default()
        };

        data_server::Entity::insert(model)
            .on_conflict(
                OnConflict::column(data_server::Column::Node)
                    .update_columns([
                        data_server::Column::FreeSpace,
                        data_server::Column::UsedSpace,
                        data_server::Column::TotalSpace,
                        data_server::Column::LastWalkerRun,
                        data_server::Column::Active,
                    ])
                    .to_owned(),
            )
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sea_orm::Database;

    use migration::MigratorTrait;

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory database");

        migration::Migrator::up(&db, None)
            .await
            .expect("failed to run migrations");

        db
    }

    fn doc(file_path: &str, size: i64) -> CanonicalDoc {
        CanonicalDoc {
            file_path: file_path.to_string(),
            full_path: format!("/nersc/projects/starofl/picodsts/{file_path}"),
            size,
            data_class: DataClass::PicoDst,
            in_container: true,
            container_path: Some("/nersc/projects/starofl/picodsts/148.tar".to_string()),
            star_details: StructuredMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_archive_record_idempotence() {
        let db = test_db().await;

        let status = db
            .record_archive_file("/archive/Run10/148.tar", 1024, ArchiveFileKind::Container)
            .await
            .unwrap();
        assert_eq!(RecordStatus::Inserted, status);

        // A repeated observation must not rewrite size or kind.
        let status = db
            .record_archive_file("/archive/Run10/148.tar", 99, ArchiveFileKind::Container)
            .await
            .unwrap();
        assert_eq!(RecordStatus::AlreadyKnown, status);

        let row = archive_file::Entity::find()
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(1024, row.size);
        assert!(row.last_seen >= row.first_seen);
    }

    #[tokio::test]
    async fn test_duplicate_routing() {
        let db = test_db().await;

        let summary = db
            .ingest_canonical_batch(vec![doc("Run10/a.picoDst.root", 10)])
            .await
            .unwrap();
        assert_eq!(1, summary.inserted);
        assert_eq!(0, summary.duplicated);

        let summary = db
            .ingest_canonical_batch(vec![
                doc("Run10/a.picoDst.root", 20),
                doc("Run10/b.picoDst.root", 30),
            ])
            .await
            .unwrap();
        assert_eq!(1, summary.inserted);
        assert_eq!(1, summary.duplicated);

        let canonical = canonical_file::Entity::find()
            .filter(canonical_file::Column::FilePath.eq("Run10/a.picoDst.root"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(10, canonical.size);

        let duplicates = duplicate_file::Entity::find().all(&db).await.unwrap();
        assert_eq!(1, duplicates.len());
        assert_eq!(20, duplicates[0].size);
    }

    #[tokio::test]
    async fn test_mark_reset_is_scoped() {
        let db = test_db().await;

        db.ingest_canonical_batch(vec![doc("Run10/a.picoDst.root", 10)])
            .await
            .unwrap();

        let candidates = db.canonical_candidates(DataClass::PicoDst).await.unwrap();
        assert_eq!(1, candidates.len());

        db.set_stage_marks(DataClass::PicoDst, StageTier::Xrd, &candidates)
            .await
            .unwrap();
        db.set_stage_marks(DataClass::PicoDst, StageTier::Disk, &candidates)
            .await
            .unwrap();

        db.reset_stage_marks(DataClass::PicoDst, StageTier::Xrd)
            .await
            .unwrap();

        let xrd = db
            .marked_paths(DataClass::PicoDst, StageTier::Xrd)
            .await
            .unwrap();
        assert!(xrd.is_empty());

        let disk = db
            .marked_paths(DataClass::PicoDst, StageTier::Disk)
            .await
            .unwrap();
        assert_eq!(1, disk.len());
    }

    fn replica(node: &str, file_path: &str, state: ReplicaState) -> ReplicaDoc {
        ReplicaDoc {
            node: node.to_string(),
            target: DataClass::PicoDst,
            tier: StageTier::Xrd,
            file_path: file_path.to_string(),
            full_path: format!("/export/data/xrd/ns/star/picodsts/{file_path}"),
            size: Some(1),
            disk: Some("data3".to_string()),
            state,
            issue: None,
        }
    }

    #[tokio::test]
    async fn test_pending_unstage_without_prior_mark() {
        let db = test_db().await;

        db.ingest_canonical_batch(vec![doc("Run10/a.picoDst.root", 10)])
            .await
            .unwrap();

        // The file is resident but selected by no directive, so it has
        // never been marked and has no mark row yet.
        let paths: BTreeSet<String> = [
            "Run10/a.picoDst.root".to_string(),
            "Run10/uncatalogued.picoDst.root".to_string(),
        ]
        .into();
        db.flag_pending_unstage(DataClass::PicoDst, StageTier::Xrd, &paths)
            .await
            .unwrap();

        let marks = staging_mark::Entity::find().all(&db).await.unwrap();
        assert_eq!(1, marks.len());
        assert!(marks[0].pending_unstage);
        assert!(!marks[0].marked);
        assert_eq!("Run10/a.picoDst.root", marks[0].file_path);
    }

    #[tokio::test]
    async fn test_remark_clears_pending_unstage() {
        let db = test_db().await;

        db.ingest_canonical_batch(vec![doc("Run10/a.picoDst.root", 10)])
            .await
            .unwrap();
        let candidates = db.canonical_candidates(DataClass::PicoDst).await.unwrap();

        db.set_stage_marks(DataClass::PicoDst, StageTier::Xrd, &candidates)
            .await
            .unwrap();

        let paths: BTreeSet<String> = ["Run10/a.picoDst.root".to_string()].into();
        db.flag_pending_unstage(DataClass::PicoDst, StageTier::Xrd, &paths)
            .await
            .unwrap();

        // Next pass: reset, then the file is selected again.
        db.reset_stage_marks(DataClass::PicoDst, StageTier::Xrd)
            .await
            .unwrap();
        db.set_stage_marks(DataClass::PicoDst, StageTier::Xrd, &candidates)
            .await
            .unwrap();

        let mark = staging_mark::Entity::find().one(&db).await.unwrap().unwrap();
        assert!(mark.marked);
        assert!(!mark.pending_unstage);
    }

    #[tokio::test]
    async fn test_retire_drops_only_transient_entries() {
        let db = test_db().await;

        db.insert_replica_entries(vec![
            replica("node1", "Run10/a.picoDst.root", ReplicaState::Resident),
            replica("node1", "Run10/b.picoDst.root", ReplicaState::New),
            replica("node1", "Run10/c.picoDst.root", ReplicaState::Missing),
            replica("node2", "Run10/d.picoDst.root", ReplicaState::New),
        ])
        .await
        .unwrap();

        db.retire_walk_entries("node1", DataClass::PicoDst, StageTier::Xrd)
            .await
            .unwrap();

        let rows = replica_entry::Entity::find().all(&db).await.unwrap();
        assert_eq!(2, rows.len());
        assert!(rows.iter().any(|r| {
            r.node == "node1" && r.state == ReplicaState::Resident
        }));
        // another node's walk outcome is untouched
        assert!(rows.iter().any(|r| r.node == "node2"));
    }

    #[tokio::test]
    async fn test_pending_unstage_survives_reset() {
        let db = test_db().await;

        db.ingest_canonical_batch(vec![doc("Run10/a.picoDst.root", 10)])
            .await
            .unwrap();
        let candidates = db.canonical_candidates(DataClass::PicoDst).await.unwrap();

        db.set_stage_marks(DataClass::PicoDst, StageTier::Xrd, &candidates)
            .await
            .unwrap();

        let paths: BTreeSet<String> = ["Run10/a.picoDst.root".to_string()].into();
        db.flag_pending_unstage(DataClass::PicoDst, StageTier::Xrd, &paths)
            .await
            .unwrap();

        db.reset_stage_marks(DataClass::PicoDst, StageTier::Xrd)
            .await
            .unwrap();

        let mark = staging_mark::Entity::find().one(&db).await.unwrap().unwrap();
        assert!(!mark.marked);
        assert!(mark.pending_unstage);
    }
}
