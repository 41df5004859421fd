//! Tape archive crawling.
//!
//! The crawler walks the configured archive folders, records every
//! physical object it sees, and feeds the logical data files into the
//! catalog. Tar containers are opened through their membership listing so
//! bundled files are catalogued like loose ones.

pub mod hpss;

use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::instrument;

use sdms::metadata::PathSchema;

use crate::config::{ArchiveConfig, Config};
use crate::database::entity::archive_file::ArchiveFileKind;
use crate::database::{CanonicalDoc, RecordStatus, SdmsDatabase};
use crate::error::{ServerError, ServerResult};
use crate::{State, StateInner};
use hpss::{ArchiveLister, ContainerLister, HpssLister, HtarLister};

/// Classifies an archive object by its file name.
pub fn classify(file_name: &str, config: &ArchiveConfig) -> ArchiveFileKind {
    if file_name.ends_with(&config.container_suffix) {
        ArchiveFileKind::Container
    } else if file_name.ends_with(&config.index_suffix) {
        ArchiveFileKind::Index
    } else if file_name.ends_with(&config.data_class.file_suffix()) {
        ArchiveFileKind::Data
    } else {
        ArchiveFileKind::Other
    }
}

/// Returns the canonical relative path of an observed path.
///
/// The canonical path starts at the `Run*` component. Container members
/// are already listed relative to it, so a path without the marker is
/// taken as a whole.
fn canonical_path(path: &str) -> &str {
    match path.find("/Run") {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn make_canonical_doc(
    observed_path: &str,
    size: i64,
    container: Option<&str>,
    schema: &PathSchema,
    config: &ArchiveConfig,
) -> Option<CanonicalDoc> {
    let file_path = canonical_path(observed_path);

    let star_details = match schema.resolve(file_path, &config.data_class.file_suffix()) {
        Ok(details) => details,
        Err(e) => {
            tracing::warn!("Skipping {}: {}", observed_path, e);
            return None;
        }
    };

    Some(CanonicalDoc {
        file_path: file_path.to_owned(),
        full_path: container.unwrap_or(observed_path).to_owned(),
        size,
        data_class: config.data_class,
        in_container: container.is_some(),
        container_path: container.map(str::to_owned),
        star_details,
    })
}

/// Runs one full archive crawl.
pub async fn run_archive_crawl(config: Config) -> ServerResult<()> {
    let state = StateInner::new(config).await;
    let lister = Arc::new(HpssLister::new(state.config.archive.base_path.clone()));

    crawl_archive(&state, lister, Arc::new(HtarLister)).await
}

/// Crawls all configured archive folders through the given listers.
#[instrument(skip_all)]
async fn crawl_archive(
    state: &State,
    lister: Arc<dyn ArchiveLister>,
    containers: Arc<dyn ContainerLister>,
) -> ServerResult<()> {
    let schema = Arc::new(PathSchema::parse(&state.config.archive.path_schema)?);

    let mut subfolders = Vec::new();
    for folder in &state.config.archive.folders {
        match lister.subfolders(folder).await {
            Ok(mut found) => subfolders.append(&mut found),
            Err(e) => tracing::warn!("Skipping archive folder {}: {}", folder, e),
        }
    }

    tracing::info!("Crawling {} archive subfolders", subfolders.len());

    let crawl_limit = Arc::new(Semaphore::new(state.config.archive.crawl_concurrency));
    let futures: Vec<_> = subfolders
        .into_iter()
        .map(|subfolder| {
            let state = state.clone();
            let lister = lister.clone();
            let containers = containers.clone();
            let schema = schema.clone();
            let crawl_limit = crawl_limit.clone();

            async move {
                let permit = crawl_limit
                    .acquire()
                    .await
                    .map_err(ServerError::listing_error)?;
                let result =
                    crawl_subfolder(&state, &*lister, &*containers, &schema, &subfolder).await;
                drop(permit);
                result
            }
        })
        .collect();

    // Listing hiccups only cost us one subfolder, but a failing catalog
    // poisons the whole pass.
    for result in join_all(futures).await {
        if let Err(e) = result {
            match e {
                ServerError::DatabaseError(_) => return Err(e),
                e => tracing::warn!("Subfolder crawl failed: {}", e),
            }
        }
    }

    Ok(())
}

#[instrument(skip_all, fields(subfolder = %subfolder))]
async fn crawl_subfolder(
    state: &State,
    lister: &dyn ArchiveLister,
    containers: &dyn ContainerLister,
    schema: &PathSchema,
    subfolder: &str,
) -> ServerResult<()> {
    let db = state.database().await?;
    let config = &state.config.archive;
    let member_suffix = config.data_class.file_suffix();

    let mut docs = Vec::new();
    let mut entries = lister.walk(subfolder);
    while let Some(entry) = entries.next().await {
        let entry = entry?;
        let name = entry
            .full_path
            .rsplit('/')
            .next()
            .unwrap_or(&entry.full_path);
        let kind = classify(name, config);

        let status = db
            .record_archive_file(&entry.full_path, entry.size, kind)
            .await?;
        if status == RecordStatus::AlreadyKnown {
            continue;
        }

        match kind {
            ArchiveFileKind::Data => {
                if let Some(doc) = make_canonical_doc(&entry.full_path, entry.size, None, schema, config)
                {
                    docs.push(doc);
                }
            }
            ArchiveFileKind::Container => {
                for member in containers.entries(&entry.full_path).await? {
                    if !member.member_path.ends_with(&member_suffix) {
                        continue;
                    }

                    if let Some(doc) = make_canonical_doc(
                        &member.member_path,
                        member.size,
                        Some(&entry.full_path),
                        schema,
                        config,
                    ) {
                        docs.push(doc);
                    }
                }
            }
            ArchiveFileKind::Index | ArchiveFileKind::Other => {}
        }
    }

    let summary = db.ingest_canonical_batch(docs).await?;
    tracing::info!(
        inserted = summary.inserted,
        duplicated = summary.duplicated,
        "Catalogued subfolder"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use sdms::metadata::MetaValue;

    fn config() -> ArchiveConfig {
        ArchiveConfig::default()
    }

    #[test]
    fn test_classify() {
        let config = config();

        assert_eq!(ArchiveFileKind::Container, classify("148.tar", &config));
        assert_eq!(ArchiveFileKind::Index, classify("148.tar.idx", &config));
        assert_eq!(
            ArchiveFileKind::Data,
            classify("st_physics_11149081_raw_1020001.picoDst.root", &config)
        );
        assert_eq!(ArchiveFileKind::Other, classify("crawl.log", &config));
        assert_eq!(
            ArchiveFileKind::Other,
            classify("st_physics.picoDstJet.root", &config)
        );
    }

    #[test]
    fn test_canonical_path() {
        assert_eq!(
            "Run10/AuAu200/148.tar",
            canonical_path("/nersc/projects/starofl/picodsts/Run10/AuAu200/148.tar")
        );

        // Container members come pre-trimmed.
        assert_eq!("Run10/AuAu200/a.root", canonical_path("Run10/AuAu200/a.root"));
    }

    #[test]
    fn test_make_canonical_doc_for_container_member() {
        let config = config();
        let schema = PathSchema::parse(&config.path_schema).unwrap();

        let doc = make_canonical_doc(
            "Run10/AuAu/200GeV/all/P10ik/149/11149081/st_physics_11149081_raw_1020001.picoDst.root",
            261120,
            Some("/nersc/projects/starofl/picodsts/Run10/AuAu200/148.tar"),
            &schema,
            &config,
        )
        .unwrap();

        assert!(doc.in_container);
        assert_eq!(
            Some("/nersc/projects/starofl/picodsts/Run10/AuAu200/148.tar".to_owned()),
            doc.container_path
        );
        assert_eq!(
            Some(&MetaValue::Int(11149081)),
            doc.star_details.get("runnumber")
        );
        assert_eq!(
            Some(&MetaValue::Str("st_physics".to_owned())),
            doc.star_details.get("stream")
        );
        assert_eq!(
            Some(&MetaValue::Str("raw".to_owned())),
            doc.star_details.get("picoType")
        );
    }

    #[test]
    fn test_make_canonical_doc_rejects_foreign_layout() {
        let config = config();
        let schema = PathSchema::parse(&config.path_schema).unwrap();

        // Wrong depth for the declared schema.
        assert!(make_canonical_doc("Run10/AuAu200/a.picoDst.root", 1, None, &schema, &config).is_none());
    }
}
