use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-language summary in the language structure map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetails {
    pub extensions: Vec<String>,
    pub files: Vec<String>,
    pub file_count: usize,
    pub total_size: u64,
    pub paradigms: Vec<String>,
    pub dominant: bool,
}

impl LanguageDetails {
    pub fn record_file(&mut self, path: &str, extension: Option<&str>, size: u64) {
        if let Some(ext) = extension {
            if !self.extensions.iter().any(|e| e == ext) {
                self.extensions.push(ext.to_string());
                self.extensions.sort();
            }
        }
        if let Err(pos) = self.files.binary_search_by(|f| f.as_str().cmp(path)) {
            self.files.insert(pos, path.to_string());
            self.file_count += 1;
            self.total_size += size;
        }
    }
}

/// Marks exactly one language as dominant: most files, then largest total
/// size, then name order.
pub fn mark_dominant(languages: &mut BTreeMap<String, LanguageDetails>) {
    let winner = languages
        .iter()
        .max_by(|(a_name, a), (b_name, b)| {
            a.file_count
                .cmp(&b.file_count)
                .then(a.total_size.cmp(&b.total_size))
                .then(b_name.cmp(a_name))
        })
        .map(|(name, _)| name.clone());

    for (name, details) in languages.iter_mut() {
        details.dominant = winner.as_deref() == Some(name.as_str());
    }
}
