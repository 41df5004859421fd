//! A duplicated physical occurrence of a logical data file.

use sea_orm::entity::prelude::*;

use super::Json;
use sdms::metadata::StructuredMetadata;

pub type DuplicateFileModel = Model;

/// A second-or-later physical occurrence of a canonical relative path.
///
/// Same shape as `canonical_file` minus the unique identity; the
/// collection is append-only and mainly feeds cleanup campaigns.
#[derive(Debug, Clone, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "duplicate_file")]
pub struct Model {
    /// Unique numeric ID of the occurrence.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Relative path duplicating an existing canonical record.
    pub file_path: String,

    /// Full archive path of this occurrence.
    pub full_path: String,

    /// Size in bytes.
    pub size: i64,

    /// Data class the file belongs to.
    pub data_class: String,

    /// Whether this occurrence lives inside a tar container.
    pub in_container: bool,

    /// Full archive path of the containing tar, if any.
    pub container_path: Option<String>,

    /// Structured metadata resolved from the relative path.
    pub star_details: Json<StructuredMetadata>,

    /// Timestamp when the occurrence was recorded.
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
