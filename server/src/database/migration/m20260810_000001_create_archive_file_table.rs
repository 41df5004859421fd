use sea_orm_migration::prelude::*;

use crate::database::entity::archive_file::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260810_000001_create_archive_file_table"
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
                    .col(ColumnDef::new(Column::FullPath).string().not_null())
                    .col(ColumnDef::new(Column::Size).big_integer().not_null())
                    .col(ColumnDef::new(Column::Kind).string_len(1).not_null())
                    .col(
                        ColumnDef::new(Column::FirstSeen)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Column::LastSeen)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-archive-file-full-path")
                    .table(Entity)
                    .col(Column::FullPath)
                    .unique()
                    .to_owned(),
            )
            .await
    }
}
