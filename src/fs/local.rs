use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use super::{FileContent, FileStat, FileSystem, ListOptions, ListedEntry};
use crate::error::{AnalysisError, Result};

/// [`FileSystem`] over the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| AnalysisError::Pattern {
            name: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| AnalysisError::Pattern {
        name: patterns.join(","),
        message: e.to_string(),
    })
}

/// A directory is excluded when anything inside it would be.
fn dir_excluded(exclude: &GlobSet, rel: &str) -> bool {
    exclude.is_match(rel) || exclude.is_match(format!("{rel}/_"))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_string_lossy().replace('\\', "/");
    if rel.is_empty() { None } else { Some(rel) }
}

fn stat_of(metadata: &std::fs::Metadata) -> FileStat {
    FileStat {
        size: metadata.len(),
        created: metadata.created().ok().map(Into::into),
        modified: metadata.modified().ok().map(Into::into),
    }
}

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &Path) -> Result<FileContent> {
        let bytes = std::fs::read(path)?;
        let metadata = std::fs::metadata(path)?;
        let content = String::from_utf8(bytes).map_err(|_| AnalysisError::FileSystem {
            path: path.to_path_buf(),
            message: "not valid UTF-8".to_string(),
        })?;
        Ok(FileContent {
            content,
            stat: stat_of(&metadata),
        })
    }

    fn list(&self, root: &Path, options: &ListOptions) -> Result<Vec<ListedEntry>> {
        if !root.is_dir() {
            return Err(AnalysisError::FileSystem {
                path: root.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        let exclude = build_globset(&options.exclude)?;
        let include = build_globset(&options.include)?;
        let max_depth = if options.recursive {
            options.max_depth
        } else {
            Some(1)
        };

        let filter_root = root.to_path_buf();
        let filter_exclude = exclude.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(options.respect_gitignore)
            .git_global(options.respect_gitignore)
            .git_exclude(options.respect_gitignore)
            .ignore(options.respect_gitignore)
            .parents(options.respect_gitignore)
            .require_git(false)
            .max_depth(max_depth)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                match relative_path(&filter_root, entry.path()) {
                    Some(rel) if is_dir => !dir_excluded(&filter_exclude, &rel),
                    _ => true,
                }
            })
            .build();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("Walk error: {err}");
                    continue;
                }
            };
            let Some(rel) = relative_path(root, entry.path()) else {
                continue;
            };
            let Some(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                entries.push(ListedEntry {
                    path: rel,
                    is_dir: true,
                    stat: FileStat::default(),
                });
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            if exclude.is_match(&rel) {
                debug!("Excluded {rel}");
                continue;
            }
            if !options.include.is_empty() && !include.is_match(&rel) {
                continue;
            }

            let stat = match entry.metadata() {
                Ok(m) => stat_of(&m),
                Err(err) => {
                    warn!("Failed to stat {rel}: {err}");
                    continue;
                }
            };
            entries.push(ListedEntry {
                path: rel,
                is_dir: false,
                stat,
            });
        }
        Ok(entries)
    }

    fn detect_project_root(&self, start: &Path, markers: &[&str]) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| markers.iter().any(|m| dir.join(m).exists()))
            .map(Path::to_path_buf)
    }
}
