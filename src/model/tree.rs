use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{directory_id, file_id};

/// Recursive directory/file tree rooted at the analysis root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemTree {
    pub root: DirectoryNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub id: String,
    /// Relative path, `""` for the root.
    pub path: String,
    pub name: String,
    pub children: Vec<TreeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEntry {
    Directory(DirectoryNode),
    File(FileNode),
}

impl TreeEntry {
    fn name(&self) -> &str {
        match self {
            TreeEntry::Directory(d) => &d.name,
            TreeEntry::File(f) => &f.name,
        }
    }

    fn sort_key(&self) -> (u8, &str) {
        match self {
            TreeEntry::Directory(d) => (0, d.name.as_str()),
            TreeEntry::File(f) => (1, f.name.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: String,
    /// Relative, `/`-separated path.
    pub path: String,
    pub name: String,
    pub extension: Option<String>,
    pub size: u64,
    /// SHA-256 hex digest of the file content.
    pub content_hash: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    #[serde(default)]
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub is_test: bool,
    pub line_count: usize,
}

impl FileNode {
    pub fn new(path: &str, size: u64, content_hash: String) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let extension = name
            .rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase());
        Self {
            id: file_id(path),
            path: path.to_string(),
            name,
            extension,
            size,
            content_hash,
            created_at: None,
            modified_at: None,
            language: None,
            metadata: FileMetadata::default(),
        }
    }

    /// File name without its final extension (`UserService.ts` -> `UserService`).
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn directory(&self) -> &str {
        super::parent_dir(&self.path)
    }
}

impl DirectoryNode {
    fn new(path: &str, name: &str) -> Self {
        Self {
            id: directory_id(path),
            path: path.to_string(),
            name: name.to_string(),
            children: Vec::new(),
        }
    }

    pub fn subdirectories(&self) -> impl Iterator<Item = &DirectoryNode> {
        self.children.iter().filter_map(|c| match c {
            TreeEntry::Directory(d) => Some(d),
            TreeEntry::File(_) => None,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.children.iter().filter_map(|c| match c {
            TreeEntry::File(f) => Some(f),
            TreeEntry::Directory(_) => None,
        })
    }

    fn insert_sorted(&mut self, entry: TreeEntry) -> usize {
        let key = entry.sort_key();
        let pos = self
            .children
            .binary_search_by(|c| c.sort_key().cmp(&key))
            .unwrap_or_else(|p| p);
        self.children.insert(pos, entry);
        pos
    }

    fn child_dir_mut(&mut self, name: &str) -> &mut DirectoryNode {
        let existing = self
            .children
            .iter()
            .position(|c| matches!(c, TreeEntry::Directory(d) if d.name == name));
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let path = if self.path.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{name}", self.path)
                };
                self.insert_sorted(TreeEntry::Directory(DirectoryNode::new(&path, name)))
            }
        };
        match &mut self.children[idx] {
            TreeEntry::Directory(d) => d,
            TreeEntry::File(_) => unreachable!("position matched a directory"),
        }
    }
}

impl FileSystemTree {
    pub fn new(root_name: &str) -> Self {
        Self {
            root: DirectoryNode::new("", root_name),
        }
    }

    /// Inserts a file, creating every missing directory on its parent chain.
    /// An existing file at the same path is replaced.
    pub fn insert_file(&mut self, file: FileNode) {
        let mut dir = &mut self.root;
        let segments: Vec<&str> = file.path.split('/').collect();
        let (dirs, _) = segments.split_at(segments.len().saturating_sub(1));
        for segment in dirs {
            dir = dir.child_dir_mut(segment);
        }
        dir.children
            .retain(|c| !(matches!(c, TreeEntry::File(_)) && c.name() == file.name));
        dir.insert_sorted(TreeEntry::File(file));
    }

    /// Ensures a directory exists even if it holds no included files.
    pub fn insert_directory(&mut self, path: &str) {
        let mut dir = &mut self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            dir = dir.child_dir_mut(segment);
        }
    }

    pub fn file(&self, path: &str) -> Option<&FileNode> {
        let (dir_path, name) = match path.rsplit_once('/') {
            Some((d, n)) => (d, n),
            None => ("", path),
        };
        self.directory(dir_path)?.files().find(|f| f.name == name)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut FileNode> {
        let (dir_path, name) = match path.rsplit_once('/') {
            Some((d, n)) => (d, n),
            None => ("", path),
        };
        let mut dir = &mut self.root;
        for segment in dir_path.split('/').filter(|s| !s.is_empty()) {
            dir = dir.children.iter_mut().find_map(|c| match c {
                TreeEntry::Directory(d) if d.name == segment => Some(d),
                _ => None,
            })?;
        }
        dir.children.iter_mut().find_map(|c| match c {
            TreeEntry::File(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    pub fn directory(&self, path: &str) -> Option<&DirectoryNode> {
        let mut dir = &self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            dir = dir.subdirectories().find(|d| d.name == segment)?;
        }
        Some(dir)
    }

    /// All files, depth-first in name order.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        collect_files(&self.root, &mut out);
        out
    }

    /// All directories including the root, depth-first in name order.
    pub fn directories(&self) -> Vec<&DirectoryNode> {
        let mut out = Vec::new();
        collect_dirs(&self.root, &mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }
}

fn collect_files<'a>(dir: &'a DirectoryNode, out: &mut Vec<&'a FileNode>) {
    for child in &dir.children {
        match child {
            TreeEntry::Directory(d) => collect_files(d, out),
            TreeEntry::File(f) => out.push(f),
        }
    }
}

fn collect_dirs<'a>(dir: &'a DirectoryNode, out: &mut Vec<&'a DirectoryNode>) {
    out.push(dir);
    for sub in dir.subdirectories() {
        collect_dirs(sub, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileNode {
        FileNode::new(path, 10, "hash".to_string())
    }

    #[test]
    fn test_insert_creates_parent_chain() {
        let mut tree = FileSystemTree::new("root");
        tree.insert_file(file("src/api/user.ts"));

        assert!(tree.directory("src").is_some());
        let api = tree.directory("src/api").unwrap();
        assert_eq!(api.id, "dir:src/api");
        assert_eq!(tree.file("src/api/user.ts").unwrap().id, "file:src/api/user.ts");
    }

    #[test]
    fn test_insert_replaces_same_path() {
        let mut tree = FileSystemTree::new("root");
        tree.insert_file(file("a.ts"));
        let mut changed = file("a.ts");
        changed.content_hash = "other".to_string();
        tree.insert_file(changed);

        assert_eq!(tree.file_count(), 1);
        assert_eq!(tree.file("a.ts").unwrap().content_hash, "other");
    }

    #[test]
    fn test_children_are_sorted_directories_first() {
        let mut tree = FileSystemTree::new("root");
        tree.insert_file(file("z.ts"));
        tree.insert_file(file("b/x.ts"));
        tree.insert_file(file("a.ts"));

        let names: Vec<&str> = tree.root.children.iter().map(TreeEntry::name).collect();
        assert_eq!(names, vec!["b", "a.ts", "z.ts"]);
        let paths: Vec<&str> = tree.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["b/x.ts", "a.ts", "z.ts"]);
    }

    #[test]
    fn test_file_node_parts() {
        let f = file("src/UserService.spec.ts");
        assert_eq!(f.name, "UserService.spec.ts");
        assert_eq!(f.extension.as_deref(), Some("ts"));
        assert_eq!(f.stem(), "UserService.spec");
        assert_eq!(f.directory(), "src");

        let dotfile = file(".gitignore");
        assert_eq!(dotfile.extension, None);
        assert_eq!(dotfile.stem(), ".gitignore");
    }

    #[test]
    fn test_file_mut_updates_language() {
        let mut tree = FileSystemTree::new("root");
        tree.insert_file(file("src/main.rs"));
        tree.file_mut("src/main.rs").unwrap().language = Some("rust".to_string());
        assert_eq!(tree.file("src/main.rs").unwrap().language.as_deref(), Some("rust"));
        assert!(tree.file_mut("src/missing.rs").is_none());
    }
}
