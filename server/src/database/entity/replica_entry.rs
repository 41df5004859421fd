//! A file present on a serving node's disk.

use sea_orm::entity::prelude::*;

pub type ReplicaEntryModel = Model;

/// The catalog state of a replica.
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(1))")]
pub enum ReplicaState {
    /// Confirmed present on the node; this is the authoritative set the
    /// staging diff reads.
    #[sea_orm(string_value = "R")]
    Resident,

    /// Observed on disk but not yet in the authoritative set.
    #[sea_orm(string_value = "N")]
    New,

    /// Previously catalogued but not observed in the latest walk, or
    /// observed with a dangling link.
    #[sea_orm(string_value = "M")]
    Missing,
}

/// One file on a serving node's disk, as seen by the replica crawler.
///
/// Rows in the `New` and `Missing` states are transient walk results;
/// promotion into (and eviction from) `Resident` is the cleanup
/// collaborator's job, after its audit window.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "replica_entry")]
pub struct Model {
    /// Unique numeric ID of the entry.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Name of the serving node.
    #[sea_orm(indexed)]
    pub node: String,

    /// Data class the file belongs to.
    pub target: String,

    /// Staging tier the node serves.
    pub tier: String,

    /// Canonical relative path of the file.
    #[sea_orm(indexed)]
    pub file_path: String,

    /// Full local path on the node.
    pub full_path: String,

    /// Size in bytes. Unset when the backing link is broken or the file
    /// was never observed.
    pub size: Option<i64>,

    /// Data disk backing the namespace link.
    pub disk: Option<String>,

    /// Catalog state of this entry.
    pub state: ReplicaState,

    /// Issue marker, e.g. `brokenLink`.
    pub issue: Option<String>,

    /// Timestamp of the walk that produced this entry.
    pub observed_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
