//! DISCOVERY: walk the root, build the file tree and hash every file.
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::AnalysisOptions;
use crate::context::ContentCache;
use crate::error::{AnalysisError, Result};
use crate::fs::{FileSystem, ListOptions};
use crate::model::{FileNode, FileSystemTree, content_hash};

static TEST_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:^test_|_test$|\.test$|\.spec$|_spec$)|^test[A-Z]|Tests?$").unwrap()
});

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs"];

/// Whether a relative path looks like test code.
pub fn is_test_path(path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('/').collect();
    let name = segments.pop().unwrap_or(path);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    TEST_FILE.is_match(stem) || segments.iter().any(|s| TEST_DIRS.contains(s))
}

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Files to analyze, in walk order.
    pub files: Vec<FileNode>,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Walks `root`, inserting every directory and every accepted file into
/// `tree`. Content is read through `cache` so hashing and analysis share
/// one load when the cache retains released entries.
pub fn discover(
    fs: &dyn FileSystem,
    root: &Path,
    options: &AnalysisOptions,
    cache: &ContentCache,
    tree: &mut FileSystemTree,
) -> Result<Discovery> {
    let list_options = ListOptions {
        recursive: true,
        // Depth counts directories below the root; the walker counts entries.
        max_depth: options.max_depth.map(|d| d + 1),
        include: Vec::new(),
        exclude: options.exclude_patterns.clone(),
        respect_gitignore: options.respect_gitignore,
    };
    let entries = fs.list(root, &list_options)?;

    let mut discovery = Discovery::default();
    for entry in entries {
        if entry.is_dir {
            tree.insert_directory(&entry.path);
            continue;
        }

        let is_test = is_test_path(&entry.path);
        if is_test && !options.include_tests {
            debug!("skipping test file {}", entry.path);
            discovery.skipped += 1;
            continue;
        }
        if entry.stat.size > options.max_file_size {
            debug!("skipping {} ({} bytes)", entry.path, entry.stat.size);
            discovery.skipped += 1;
            continue;
        }

        let absolute = root.join(&entry.path);
        let lease = cache.acquire(&entry.path, || fs.read(&absolute).map(|c| c.content));
        let content = match lease {
            Ok(content) => content,
            Err(AnalysisError::FileSystem { message, .. }) => {
                debug!("skipping {}: {message}", entry.path);
                discovery.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("Failed to read {}: {e}", entry.path);
                discovery.warnings.push(format!("{}: {e}", entry.path));
                discovery.skipped += 1;
                continue;
            }
        };

        let mut file = FileNode::new(&entry.path, entry.stat.size, content_hash(&content));
        file.created_at = entry.stat.created;
        file.modified_at = entry.stat.modified;
        file.metadata.is_test = is_test;
        file.metadata.line_count = content.lines().count();
        tree.insert_file(file.clone());
        discovery.files.push(file);
    }

    debug!(
        "discovered {} files ({} skipped)",
        discovery.files.len(),
        discovery.skipped
    );
    Ok(discovery)
}

/// Content hashes of every file in a tree, keyed by path.
pub fn file_hashes(tree: &FileSystemTree) -> HashMap<String, String> {
    tree.files()
        .into_iter()
        .map(|f| (f.path.clone(), f.content_hash.clone()))
        .collect()
}
