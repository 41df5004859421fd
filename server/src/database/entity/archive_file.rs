//! A physical object on tape.

use sea_orm::entity::prelude::*;

pub type ArchiveFileModel = Model;

/// The kind of a physical archive object.
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(1))")]
pub enum ArchiveFileKind {
    /// A tar container bundling many data files.
    #[sea_orm(string_value = "T")]
    Container,

    /// An index produced alongside a tar container.
    #[sea_orm(string_value = "I")]
    Index,

    /// A standalone data file of the crawled data class.
    #[sea_orm(string_value = "D")]
    Data,

    /// Anything else living in the archive tree.
    #[sea_orm(string_value = "O")]
    Other,
}

/// A physical object on tape, as observed by the archive crawler.
///
/// This is the authoritative record of what is on tape. Re-observing an
/// existing path only refreshes `last_seen`; size and kind are never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "archive_file")]
pub struct Model {
    /// Unique numeric ID of the archive file.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Full path of the object on tape.
    #[sea_orm(indexed)]
    pub full_path: String,

    /// Size in bytes.
    pub size: i64,

    /// Kind of the object.
    pub kind: ArchiveFileKind,

    /// Timestamp when the object was first observed.
    pub first_seen: ChronoDateTimeUtc,

    /// Timestamp when the object was last observed.
    pub last_seen: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
