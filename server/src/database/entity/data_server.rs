//! Capacity telemetry of a serving node.

use sea_orm::entity::prelude::*;

pub type DataServerModel = Model;

/// Capacity snapshot of one serving node, refreshed on every walk.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "data_server")]
pub struct Model {
    /// Unique numeric ID of the node.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Name of the serving node.
    #[sea_orm(indexed)]
    pub node: String,

    /// Free bytes across the node's data partitions.
    pub free_space: i64,

    /// Used bytes across the node's data partitions.
    pub used_space: i64,

    /// Total bytes across the node's data partitions.
    pub total_space: i64,

    /// Timestamp of the last completed walk.
    pub last_walker_run: ChronoDateTimeUtc,

    /// Whether the node is actively serving.
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
