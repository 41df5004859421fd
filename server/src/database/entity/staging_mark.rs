//! Per-(file, tier) staging mark.

use sea_orm::entity::prelude::*;

pub type StagingMarkModel = Model;

/// The staging mark of one canonical file on one tier.
///
/// Marks are transient: every reconciliation pass resets `marked` for the
/// (target, tier) pair before applying the current directive set, so a
/// mark never reflects stale history. `pending_unstage` survives the
/// reset; it is cleared externally once the cleanup collaborator has
/// removed the replica.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "staging_mark")]
pub struct Model {
    /// Unique numeric ID of the mark.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// ID of the canonical file this mark belongs to.
    #[sea_orm(indexed)]
    pub canonical_file_id: i64,

    /// Canonical relative path, denormalized for diffing without a join.
    pub file_path: String,

    /// Data class of the file.
    pub target: String,

    /// Staging tier the mark applies to.
    pub tier: String,

    /// Whether the current directive set selects this file for this tier.
    pub marked: bool,

    /// Whether the file's replica on this tier awaits removal.
    pub pending_unstage: bool,

    /// Timestamp of the last mark update.
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::canonical_file::Entity",
        from = "Column::CanonicalFileId",
        to = "super::canonical_file::Column::Id"
    )]
    CanonicalFile,
}

impl Related<super::canonical_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CanonicalFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
