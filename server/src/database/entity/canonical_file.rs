//! A logical data file in the archive catalog.

use sea_orm::entity::prelude::*;

use super::Json;
use sdms::metadata::StructuredMetadata;

pub type CanonicalFileModel = Model;

/// One logical data file, regardless of which container holds it.
///
/// The canonical relative path is the identity: the record is created once
/// by catalog ingestion and never overwritten. Later physical occurrences
/// of the same path land in `duplicate_file`.
#[derive(Debug, Clone, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "canonical_file")]
pub struct Model {
    /// Unique numeric ID of the file.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Canonical relative path, starting at the `Run*` component.
    #[sea_orm(indexed)]
    pub file_path: String,

    /// Full archive path of the physical occurrence backing this record.
    pub full_path: String,

    /// Size in bytes.
    pub size: i64,

    /// Data class the file belongs to.
    #[sea_orm(indexed)]
    pub data_class: String,

    /// Whether the file lives inside a tar container.
    pub in_container: bool,

    /// Full archive path of the containing tar, if any.
    pub container_path: Option<String>,

    /// Structured metadata resolved from the canonical relative path.
    pub star_details: Json<StructuredMetadata>,

    /// Timestamp when the record was created.
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::staging_mark::Entity")]
    StagingMark,
}

impl Related<super::staging_mark::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StagingMark.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
