//! Database migrations.

pub use sea_orm_migration::*;

mod m20260810_000001_create_archive_file_table;
mod m20260810_000002_create_canonical_file_table;
mod m20260810_000003_create_duplicate_file_table;
mod m20260810_000004_create_replica_entry_table;
mod m20260810_000005_create_data_server_table;
mod m20260810_000006_create_staging_mark_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_000001_create_archive_file_table::Migration),
            Box::new(m20260810_000002_create_canonical_file_table::Migration),
            Box::new(m20260810_000003_create_duplicate_file_table::Migration),
            Box::new(m20260810_000004_create_replica_entry_table::Migration),
            Box::new(m20260810_000005_create_data_server_table::Migration),
            Box::new(m20260810_000006_create_staging_mark_table::Migration),
        ]
    }
}
