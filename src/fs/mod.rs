//! File system port.
//!
//! The pipeline only touches the disk through [`FileSystem`], so tests and
//! alternative hosts can swap the adapter.
pub mod local;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;

pub use local::LocalFileSystem;

/// Markers that identify a project root, checked in order.
pub const DEFAULT_ROOT_MARKERS: &[&str] = &[
    ".git",
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileStat {
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FileContent {
    pub content: String,
    pub stat: FileStat,
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub recursive: bool,
    /// Walker depth: `Some(1)` lists only the root's direct entries.
    pub max_depth: Option<usize>,
    /// When non-empty, files must match at least one of these globs.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: None,
            include: Vec::new(),
            exclude: Vec::new(),
            respect_gitignore: true,
        }
    }
}

/// One listed entry, with its path relative to the listing root.
#[derive(Debug, Clone)]
pub struct ListedEntry {
    /// Relative, `/`-separated path.
    pub path: String,
    pub is_dir: bool,
    pub stat: FileStat,
}

pub trait FileSystem {
    fn read(&self, path: &Path) -> Result<FileContent>;

    /// Lists entries below `root` in a stable, name-sorted order.
    fn list(&self, root: &Path, options: &ListOptions) -> Result<Vec<ListedEntry>>;

    /// Walks up from `start` to the first directory holding one of `markers`.
    fn detect_project_root(&self, start: &Path, markers: &[&str]) -> Option<PathBuf>;
}
