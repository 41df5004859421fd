#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]
#![cfg_attr(
    not(debug_assertions),
    deny(unused_imports, unused_mut, unused_variables,)
)]

pub mod archive;
pub mod config;
pub mod database;
pub mod error;
pub mod replica;
pub mod staging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{query::Statement, ConnectionTrait, Database, DatabaseConnection};
use tokio::sync::OnceCell;
use tokio::time;

use config::Config;
use database::migration::{Migrator, MigratorTrait};
use error::{ServerError, ServerResult};

type State = Arc<StateInner>;

/// Global server state.
#[derive(Debug)]
pub struct StateInner {
    /// The SDMS Server configuration.
    config: Config,

    /// Handle to the database.
    database: OnceCell<DatabaseConnection>,
}

impl StateInner {
    async fn new(config: Config) -> State {
        Arc::new(Self {
            config,
            database: OnceCell::new(),
        })
    }

    /// Returns a handle to the database.
    async fn database(&self) -> ServerResult<&DatabaseConnection> {
        self.database
            .get_or_try_init(|| async {
                Database::connect(&self.config.database.url)
                    .await
                    .map_err(ServerError::database_error)
            })
            .await
    }

    /// Sends periodic heartbeat queries to the database.
    async fn run_db_heartbeat(&self) -> ServerResult<()> {
        let db = self.database().await?;
        let stmt =
            Statement::from_string(db.get_database_backend(), "SELECT 'heartbeat';".to_string());

        loop {
            let _ = db.execute(stmt.clone()).await;
            time::sleep(Duration::from_secs(60)).await;
        }
    }
}

/// Sends periodic heartbeat queries to the database, if enabled.
pub async fn run_db_heartbeat(config: Config) -> Result<()> {
    let state = StateInner::new(config).await;

    if state.config.database.heartbeat {
        state.run_db_heartbeat().await?;
    }

    Ok(())
}

/// Runs database migrations.
pub async fn run_migrations(config: Config) -> Result<()> {
    eprintln!("Running migrations...");

    let state = StateInner::new(config).await;
    let db = state.database().await?;
    Migrator::up(db, None).await?;

    Ok(())
}
