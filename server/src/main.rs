use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio::join;
use tokio::task::spawn;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use sdms_server::config;

/// Scientific data management server.
#[derive(Debug, Parser)]
#[clap(version)]
#[clap(propagate_version = true)]
struct Opts {
    /// Path to the config file.
    #[clap(short = 'f', long)]
    config: Option<PathBuf>,

    /// Mode to run.
    #[clap(long, default_value = "monolithic")]
    mode: ServerMode,

    /// Whether to enable tokio-console.
    ///
    /// The console server will listen on its default port.
    #[clap(long)]
    tokio_console: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ServerMode {
    /// Run the archive crawler, then the stager periodically.
    Monolithic,

    /// Run the archive crawler once then exit.
    ArchiveCrawler,

    /// Run the replica crawler for this node once then exit.
    ReplicaCrawler,

    /// Run the staging reconciler periodically.
    Stager,

    /// Run one staging reconciliation pass then exit.
    StagerOnce,

    /// Run the database migrations then exit.
    DbMigrations,

    /// Check the configuration then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    init_logging(opts.tokio_console);
    dump_version();

    let config = config::load_config(opts.config.as_deref())?;

    match opts.mode {
        ServerMode::Monolithic => {
            sdms_server::run_migrations(config.clone()).await?;

            let (crawl, _, heartbeat) = join!(
                sdms_server::archive::run_archive_crawl(config.clone()),
                sdms_server::staging::run_stager(config.clone()),
                sdms_server::run_db_heartbeat(config.clone()),
            );

            crawl?;
            heartbeat?;
        }
        ServerMode::ArchiveCrawler => {
            sdms_server::archive::run_archive_crawl(config).await?;
        }
        ServerMode::ReplicaCrawler => {
            sdms_server::replica::run_replica_crawl(config).await?;
        }
        ServerMode::Stager => {
            sdms_server::staging::run_stager(config).await;
        }
        ServerMode::StagerOnce => {
            sdms_server::staging::run_staging_pass_once(config).await?;
        }
        ServerMode::DbMigrations => {
            sdms_server::run_migrations(config).await?;
        }
        ServerMode::CheckConfig => {
            // config is valid, let's just exit :)
        }
    }

    Ok(())
}

fn init_logging(tokio_console: bool) {
    let env_filter = EnvFilter::from_default_env();
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(env_filter);

    let error_layer = ErrorLayer::default();

    let console_layer = if tokio_console {
        let (layer, server) = console_subscriber::ConsoleLayer::new();
        spawn(server.serve());
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(error_layer)
        .with(console_layer)
        .init();

    if tokio_console {
        eprintln!("Note: tokio-console is enabled");
    }
}

fn dump_version() {
    #[cfg(debug_assertions)]
    eprintln!("SDMS Server {} (debug)", env!("CARGO_PKG_VERSION"));

    #[cfg(not(debug_assertions))]
    eprintln!("SDMS Server {} (release)", env!("CARGO_PKG_VERSION"));
}
