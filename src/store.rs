//! JSON persistence of a [`CodebaseUnderstanding`].
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::CodebaseUnderstanding;

/// Writes `understanding` as pretty JSON, creating the parent directory.
pub fn save(understanding: &CodebaseUnderstanding, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(understanding).map_err(StoreError::Serialize)?;
    fs::write(path, json).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Saved understanding {} ({} nodes) to {}",
        understanding.id,
        understanding.nodes.len(),
        path.display()
    );
    Ok(())
}

pub fn load(path: &Path) -> Result<CodebaseUnderstanding, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let understanding: CodebaseUnderstanding =
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Loaded understanding {} from {}", understanding.id, path.display());
    Ok(understanding)
}
