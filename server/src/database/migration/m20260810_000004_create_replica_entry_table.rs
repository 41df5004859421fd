use sea_orm_migration::prelude::*;

use crate::database::entity::replica_entry::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260810_000004_create_replica_entry_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Column::Node).string().not_null())
                    .col(ColumnDef::new(Column::Target).string().not_null())
                    .col(ColumnDef::new(Column::Tier).string().not_null())
                    .col(ColumnDef::new(Column::FilePath).string().not_null())
                    .col(ColumnDef::new(Column::FullPath).string().not_null())
                    .col(ColumnDef::new(Column::Size).big_integer())
                    .col(ColumnDef::new(Column::Disk).string())
                    .col(ColumnDef::new(Column::State).string_len(1).not_null())
                    .col(ColumnDef::new(Column::Issue).string())
                    .col(
                        ColumnDef::new(Column::ObservedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-replica-entry-node")
                    .table(Entity)
                    .col(Column::Node)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-replica-entry-file-path")
                    .table(Entity)
                    .col(Column::FilePath)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-replica-entry-state")
                    .table(Entity)
                    .col(Column::Target)
                    .col(Column::Tier)
                    .col(Column::State)
                    .to_owned(),
            )
            .await
    }
}
