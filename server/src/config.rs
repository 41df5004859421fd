//! Server configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use xdg::BaseDirectories;

use sdms::staging::{DataClass, StageTier};

/// Application prefix in XDG base directories.
///
/// This will be concatenated into `$XDG_CONFIG_HOME/sdms`.
const XDG_PREFIX: &str = "sdms";

/// Environment variable holding the configuration path.
const ENV_CONFIG_PATH: &str = "SDMS_SERVER_CONFIG";

/// Configuration for the SDMS server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database connection.
    pub database: DatabaseConfig,

    /// Tape archive crawling.
    #[serde(default = "Default::default")]
    pub archive: ArchiveConfig,

    /// Serving-node replica crawling.
    #[serde(default = "Default::default")]
    pub node: NodeConfig,

    /// Staging reconciliation.
    pub staging: StagingConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,

    /// Whether to enable sending of periodic heartbeat queries.
    ///
    /// If enabled, a heartbeat query will be sent every minute.
    #[serde(default = "default_db_heartbeat")]
    pub heartbeat: bool,
}

/// Tape archive crawling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Root of the archive tree holding the data folders.
    #[serde(rename = "base-path")]
    #[serde(default = "default_archive_base_path")]
    pub base_path: String,

    /// Top-level folders to crawl, relative to the base path.
    #[serde(default = "default_archive_folders")]
    pub folders: Vec<String>,

    /// The data class this crawler catalogs.
    #[serde(rename = "data-class")]
    #[serde(default = "default_data_class")]
    pub data_class: DataClass,

    /// Declared path schema for structured-metadata resolution.
    ///
    /// Fields are separated by `/`; a trailing `%d` or `%f` declares an
    /// integer or float field, everything else is a string.
    #[serde(rename = "path-schema")]
    #[serde(default = "default_path_schema")]
    pub path_schema: String,

    /// File suffix recognizing tar containers.
    #[serde(rename = "container-suffix")]
    #[serde(default = "default_container_suffix")]
    pub container_suffix: String,

    /// File suffix recognizing container indexes.
    #[serde(rename = "index-suffix")]
    #[serde(default = "default_index_suffix")]
    pub index_suffix: String,

    /// Number of archive subfolders crawled concurrently.
    #[serde(rename = "crawl-concurrency")]
    #[serde(default = "default_crawl_concurrency")]
    pub crawl_concurrency: usize,
}

/// Serving-node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Root of the namespace holding the staged files on this node.
    #[serde(rename = "namespace-prefix")]
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: PathBuf,

    /// Mount-point prefix of the data partitions backing the namespace.
    #[serde(rename = "data-mount-prefix")]
    #[serde(default = "default_data_mount_prefix")]
    pub data_mount_prefix: String,

    /// Working directory of each target, relative to the namespace prefix.
    #[serde(rename = "base-folders")]
    #[serde(default = "default_base_folders")]
    pub base_folders: HashMap<DataClass, String>,

    /// The staging tier this node serves.
    #[serde(default = "default_node_tier")]
    pub tier: StageTier,

    /// Node name override. Defaults to the host name.
    #[serde(default = "Default::default")]
    pub name: Option<String>,
}

/// Staging reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Path to the staging request file.
    #[serde(rename = "request-file")]
    pub request_file: PathBuf,

    /// Directory receiving the per-(target, tier) stage plan files.
    #[serde(rename = "plan-dir")]
    #[serde(default = "default_plan_dir")]
    pub plan_dir: PathBuf,

    /// Fraction of a container's data-class entries that must be selected
    /// before the container is staged wholesale.
    #[serde(rename = "container-threshold")]
    #[serde(default = "default_container_threshold")]
    pub container_threshold: f64,

    /// Whether a fraction exactly at the threshold stages the container.
    #[serde(rename = "container-threshold-inclusive")]
    #[serde(default = "default_container_threshold_inclusive")]
    pub container_threshold_inclusive: bool,

    /// The frequency to run reconciliation passes at.
    ///
    /// If zero, the periodic stager is disabled, but a single pass can
    /// still be run with `sdmsd --mode stager-once`.
    #[serde(with = "humantime_serde", default = "default_staging_interval")]
    pub interval: Duration,
}

fn default_db_heartbeat() -> bool {
    false
}

fn default_archive_base_path() -> String {
    "/nersc/projects/starofl".to_owned()
}

fn default_archive_folders() -> Vec<String> {
    vec!["picodsts".to_owned(), "picoDST".to_owned()]
}

fn default_data_class() -> DataClass {
    DataClass::PicoDst
}

fn default_path_schema() -> String {
    "runyear/system/energy/trigger/production/day%d/runnumber%d".to_owned()
}

fn default_container_suffix() -> String {
    ".tar".to_owned()
}

fn default_index_suffix() -> String {
    ".idx".to_owned()
}

fn default_crawl_concurrency() -> usize {
    4
}

fn default_namespace_prefix() -> PathBuf {
    PathBuf::from("/export/data/xrd/ns/star")
}

fn default_data_mount_prefix() -> String {
    "/export/data".to_owned()
}

fn default_base_folders() -> HashMap<DataClass, String> {
    HashMap::from([
        (DataClass::PicoDst, "picodsts".to_owned()),
        (DataClass::PicoDstJet, "picodsts/JetPicoDsts".to_owned()),
    ])
}

fn default_node_tier() -> StageTier {
    StageTier::Xrd
}

fn default_plan_dir() -> PathBuf {
    PathBuf::from("/scratch")
}

fn default_container_threshold() -> f64 {
    0.25
}

fn default_container_threshold_inclusive() -> bool {
    false
}

fn default_staging_interval() -> Duration {
    Duration::from_secs(43200)
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_path: default_archive_base_path(),
            folders: default_archive_folders(),
            data_class: default_data_class(),
            path_schema: default_path_schema(),
            container_suffix: default_container_suffix(),
            index_suffix: default_index_suffix(),
            crawl_concurrency: default_crawl_concurrency(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: default_namespace_prefix(),
            data_mount_prefix: default_data_mount_prefix(),
            base_folders: default_base_folders(),
            tier: default_node_tier(),
            name: None,
        }
    }
}

/// Loads the configuration, preferring an explicit path over the
/// environment variable over the XDG location.
pub fn load_config(cli_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = cli_path {
        load_config_from_path(path)
    } else if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        load_config_from_path(Path::new(&path))
    } else {
        load_config_from_path(&get_xdg_config_path()?)
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    tracing::info!("Using configurations: {:?}", path);

    let config = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&config)?)
}

pub fn get_xdg_config_path() -> Result<PathBuf> {
    let xdg_dirs = BaseDirectories::with_prefix(XDG_PREFIX)?;
    let config_path = xdg_dirs.place_config_file("server.toml")?;

    Ok(config_path)
}
