use sea_orm_migration::prelude::*;

use crate::database::entity::data_server::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260810_000005_create_data_server_table"
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
                    .col(ColumnDef::new(Column::FreeSpace).big_integer().not_null())
                    .col(ColumnDef::new(Column::UsedSpace).big_integer().not_null())
                    .col(ColumnDef::new(Column::TotalSpace).big_integer().not_null())
                    .col(
                        ColumnDef::new(Column::LastWalkerRun)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Column::Active).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-data-server-node")
                    .table(Entity)
                    .col(Column::Node)
                    .unique()
                    .to_owned(),
            )
            .await
    }
}
