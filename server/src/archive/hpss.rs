//! Listings of the tape archive.
//!
//! The archive is reachable only through the `hsi` and `htar` command-line
//! clients. Both print human-oriented listings, so the parsers here work
//! line by line and normalize runs of whitespace before splitting.

use std::io;
use std::process::Stdio;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::ServerResult;

/// One file observed in a recursive archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full path of the file on tape.
    pub full_path: String,

    /// Size in bytes.
    pub size: i64,
}

/// One member of a tar container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Path of the member inside the container.
    pub member_path: String,

    /// Size in bytes.
    pub size: i64,
}

/// A source of recursive archive listings.
#[async_trait]
pub trait ArchiveLister: Send + Sync {
    /// Lists the immediate subfolders of one archive folder.
    async fn subfolders(&self, folder: &str) -> ServerResult<Vec<String>>;

    /// Streams all files under one archive path.
    fn walk(&self, path: &str) -> BoxStream<'static, ServerResult<ArchiveEntry>>;
}

/// A source of tar container membership listings.
#[async_trait]
pub trait ContainerLister: Send + Sync {
    /// Lists the members of one container.
    async fn entries(&self, container_path: &str) -> ServerResult<Vec<ContainerEntry>>;
}

/// Incremental parser for `hsi ls -lR` output.
///
/// The listing is a sequence of blocks. A block starts with a header line
/// holding the directory path followed by a colon and ends at the next
/// blank line. Lines between them are one file or directory each.
pub struct LsBlockParser {
    root: String,
    current_block: Option<String>,
}

impl LsBlockParser {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            current_block: None,
        }
    }

    /// Feeds one listing line, returning a file entry if the line is one.
    pub fn feed(&mut self, line: &str) -> Option<ArchiveEntry> {
        let cleaned = line.split_whitespace().collect::<Vec<_>>().join(" ");

        if cleaned.is_empty() {
            self.current_block = None;
            return None;
        }

        if cleaned.starts_with(&self.root) {
            self.current_block = Some(cleaned.trim_end_matches(':').to_owned());
            return None;
        }

        let block = self.current_block.as_ref()?;

        // Directories reappear as their own blocks later.
        if cleaned.starts_with('d') {
            return None;
        }

        let tokens: Vec<&str> = cleaned.splitn(9, ' ').collect();
        if tokens.len() < 9 {
            return None;
        }

        let size: i64 = tokens[4].parse().ok()?;

        Some(ArchiveEntry {
            full_path: format!("{}/{}", block, tokens[8]),
            size,
        })
    }
}

/// Parses one line of `htar -tf` output.
pub fn parse_htar_line(line: &str) -> Option<ContainerEntry> {
    let cleaned = line.split_whitespace().collect::<Vec<_>>().join(" ");

    // The trailer line and directory members carry no file.
    if cleaned.starts_with("HTAR: HTAR SUCCESSFUL") || cleaned.starts_with("HTAR: d") {
        return None;
    }

    let tokens: Vec<&str> = cleaned.splitn(8, ' ').collect();
    if tokens.len() < 7 {
        return None;
    }

    let size: i64 = tokens[3].parse().ok()?;

    Some(ContainerEntry {
        member_path: tokens[6].to_owned(),
        size,
    })
}

/// Archive listings through the `hsi` client.
#[derive(Debug, Clone)]
pub struct HpssLister {
    base_path: String,
}

impl HpssLister {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

fn hsi_command(args: &[&str]) -> Command {
    let mut command = Command::new("hsi");
    command
        .arg("-q")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    command
}

async fn await_success(mut child: tokio::process::Child, what: &str) -> ServerResult<()> {
    let status = child.wait().await?;

    if !status.success() {
        return Err(io::Error::other(format!("{what} exited with {status}")).into());
    }

    Ok(())
}

#[async_trait]
impl ArchiveLister for HpssLister {
    async fn subfolders(&self, folder: &str) -> ServerResult<Vec<String>> {
        let parent = format!("{}/{}", self.base_path, folder);

        let mut child = hsi_command(&["ls", "-1", &parent]).spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::other("hsi child has no stdout")
        })?;

        let mut folders = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let name = line.trim();
            if name.is_empty() || name.ends_with(':') {
                continue;
            }

            folders.push(format!("{parent}/{name}"));
        }

        await_success(child, "hsi ls -1").await?;

        Ok(folders)
    }

    fn walk(&self, path: &str) -> BoxStream<'static, ServerResult<ArchiveEntry>> {
        let path = path.to_owned();

        Box::pin(try_stream! {
            let mut child = hsi_command(&["ls", "-lR", &path]).spawn()?;
            let stdout = child.stdout.take().ok_or_else(|| {
                io::Error::other("hsi child has no stdout")
            })?;

            let mut parser = LsBlockParser::new(path);
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(entry) = parser.feed(&line) {
                    yield entry;
                }
            }

            await_success(child, "hsi ls -lR").await?;
        })
    }
}

/// Container listings through the `htar` client.
#[derive(Debug, Clone, Default)]
pub struct HtarLister;

#[async_trait]
impl ContainerLister for HtarLister {
    async fn entries(&self, container_path: &str) -> ServerResult<Vec<ContainerEntry>> {
        let mut child = Command::new("htar")
            .arg("-tf")
            .arg(container_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::other("htar child has no stdout")
        })?;

        let mut entries = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(entry) = parse_htar_line(&line) {
                entries.push(entry);
            }
        }

        await_success(child, "htar -tf").await?;

        Ok(entries)
    }
}
