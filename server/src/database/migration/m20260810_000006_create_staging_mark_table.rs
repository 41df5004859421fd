use sea_orm_migration::prelude::*;

use crate::database::entity::canonical_file;
use crate::database::entity::staging_mark::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260810_000006_create_staging_mark_table"
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
                    .col(
                        ColumnDef::new(Column::CanonicalFileId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Column::FilePath).string().not_null())
                    .col(ColumnDef::new(Column::Target).string().not_null())
                    .col(ColumnDef::new(Column::Tier).string().not_null())
                    .col(ColumnDef::new(Column::Marked).boolean().not_null())
                    .col(
                        ColumnDef::new(Column::PendingUnstage)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-staging-mark-canonical-file")
                            .from(Entity, Column::CanonicalFileId)
                            .to(canonical_file::Entity, canonical_file::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-staging-mark-file-tier")
                    .table(Entity)
                    .col(Column::CanonicalFileId)
                    .col(Column::Tier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-staging-mark-pair")
                    .table(Entity)
                    .col(Column::Target)
                    .col(Column::Tier)
                    .to_owned(),
            )
            .await
    }
}
