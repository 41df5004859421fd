use sea_orm_migration::prelude::*;

use crate::database::entity::canonical_file::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260810_000002_create_canonical_file_table"
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
                    .col(ColumnDef::new(Column::FilePath).string().not_null())
                    .col(ColumnDef::new(Column::FullPath).string().not_null())
                    .col(ColumnDef::new(Column::Size).big_integer().not_null())
                    .col(ColumnDef::new(Column::DataClass).string().not_null())
                    .col(ColumnDef::new(Column::InContainer).boolean().not_null())
                    .col(ColumnDef::new(Column::ContainerPath).string())
                    .col(ColumnDef::new(Column::StarDetails).string().not_null())
                    .col(
                        ColumnDef::new(Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-canonical-file-path")
                    .table(Entity)
                    .col(Column::FilePath)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-canonical-file-class")
                    .table(Entity)
                    .col(Column::DataClass)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-canonical-file-container")
                    .table(Entity)
                    .col(Column::ContainerPath)
                    .to_owned(),
            )
            .await
    }
}
