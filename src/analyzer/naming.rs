//! Identifier casing, word splitting and affix probing.
use std::collections::BTreeSet;
use std::ops::Range;

use crate::context::{DefinitionCategory, PatternRegistry};
use crate::error::Result;

/// Casing-style definitions, registered under `naming:<style>`.
pub const CASING_STYLES: &[(&str, &str)] = &[
    ("camelCase", r"^[a-z][a-z0-9]*(?:[A-Z][a-z0-9]*)*$"),
    ("PascalCase", r"^[A-Z][a-zA-Z0-9]*[a-z][a-zA-Z0-9]*$"),
    ("snake_case", r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)+$"),
    ("kebab-case", r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)+$"),
    ("UPPER_CASE", r"^[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)*$"),
];

pub fn register_casing_styles(registry: &mut PatternRegistry) -> Result<()> {
    for (style, regex) in CASING_STYLES {
        registry.register(
            &format!("naming:{style}"),
            DefinitionCategory::Naming,
            regex,
            &format!("{style} identifiers"),
        )?;
    }
    Ok(())
}

/// The casing style of `name`, ignoring leading/trailing `_` and `$`.
pub fn casing_style<'a>(registry: &'a PatternRegistry, name: &str) -> Option<&'a str> {
    let trimmed = name.trim_matches(|c| c == '_' || c == '$');
    registry
        .first_match(DefinitionCategory::Naming, trimmed)
        .and_then(|d| d.name.strip_prefix("naming:"))
}

/// Byte ranges of the words in an identifier, split on separators, case
/// humps and acronym boundaries (`HTTPServer` -> `HTTP`, `Server`).
pub fn word_spans(s: &str) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (k, &(i, c)) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if let Some(st) = start.take() {
                spans.push(st..i);
            }
            continue;
        }
        match start {
            None => start = Some(i),
            Some(st) => {
                let prev = chars[k - 1].1;
                let next = chars.get(k + 1).map(|&(_, n)| n);
                let hump = c.is_uppercase() && (prev.is_lowercase() || prev.is_ascii_digit());
                let acronym_end = c.is_uppercase()
                    && prev.is_uppercase()
                    && next.is_some_and(char::is_lowercase);
                if hump || acronym_end {
                    spans.push(st..i);
                    start = Some(i);
                }
            }
        }
    }
    if let Some(st) = start {
        spans.push(st..s.len());
    }
    spans
}

/// Lowercase words of an identifier.
pub fn split_words(s: &str) -> Vec<String> {
    word_spans(s)
        .into_iter()
        .map(|r| s[r].to_lowercase())
        .collect()
}

/// Prefixes and suffixes of `name` worth tallying.
///
/// Windows of 3 up to `min(5, len / 2)` characters are probed from each end;
/// each window is widened to the casing word it touches. Affixes equal to the
/// whole identifier are dropped, and each affix is reported once.
pub fn affixes(name: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut prefixes = BTreeSet::new();
    let mut suffixes = BTreeSet::new();
    let spans = word_spans(name);
    let boundaries: Vec<usize> = name
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(name.len()))
        .collect();
    let len = boundaries.len() - 1;
    let max = (len / 2).min(5);

    for window in 3..=max {
        // Last byte covered by the prefix window, first byte of the suffix window.
        let prefix_last = boundaries[window - 1];
        let suffix_first = boundaries[len - window];

        if let Some(end) = spans
            .iter()
            .find(|r| r.start <= prefix_last && prefix_last < r.end)
            .or_else(|| spans.iter().rev().find(|r| r.end <= prefix_last))
            .map(|r| r.end)
        {
            let prefix = &name[..end];
            if end < name.len() && !prefix.is_empty() {
                prefixes.insert(prefix.trim_end_matches(['_', '-', '.']).to_string());
            }
        }

        if let Some(start) = spans
            .iter()
            .find(|r| r.start <= suffix_first && suffix_first < r.end)
            .or_else(|| spans.iter().find(|r| r.start > suffix_first))
            .map(|r| r.start)
        {
            let suffix = &name[start..];
            if start > 0 && !suffix.is_empty() {
                suffixes.insert(suffix.to_string());
            }
        }
    }
    prefixes.retain(|p| !p.is_empty());
    (prefixes, suffixes)
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PatternRegistry {
        let mut registry = PatternRegistry::new();
        register_casing_styles(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("camelCaseWord"), vec!["camel", "case", "word"]);
        assert_eq!(split_words("PascalCase"), vec!["pascal", "case"]);
        assert_eq!(split_words("snake_case_word"), vec!["snake", "case", "word"]);
        assert_eq!(split_words("HTTPServer"), vec!["http", "server"]);
        assert_eq!(split_words("user-service"), vec!["user", "service"]);
        assert_eq!(split_words("getUser2Name"), vec!["get", "user2", "name"]);
    }

    #[test]
    fn test_casing_styles_are_exclusive() {
        let registry = registry();
        assert_eq!(casing_style(&registry, "fetchUser"), Some("camelCase"));
        assert_eq!(casing_style(&registry, "handle"), Some("camelCase"));
        assert_eq!(casing_style(&registry, "UserService"), Some("PascalCase"));
        assert_eq!(casing_style(&registry, "HTTPServer"), Some("PascalCase"));
        assert_eq!(casing_style(&registry, "load_user"), Some("snake_case"));
        assert_eq!(casing_style(&registry, "user-service"), Some("kebab-case"));
        assert_eq!(casing_style(&registry, "MAX_SIZE"), Some("UPPER_CASE"));
        assert_eq!(casing_style(&registry, "__init__"), Some("camelCase"));
        assert_eq!(casing_style(&registry, "weird-Mix_x"), None);
    }

    #[test]
    fn test_affixes_widen_to_words() {
        let (prefixes, suffixes) = affixes("UserService");
        assert_eq!(prefixes.into_iter().collect::<Vec<_>>(), vec!["User"]);
        assert_eq!(suffixes.into_iter().collect::<Vec<_>>(), vec!["Service"]);

        let (prefixes, suffixes) = affixes("user_service");
        assert_eq!(prefixes.into_iter().collect::<Vec<_>>(), vec!["user"]);
        assert_eq!(suffixes.into_iter().collect::<Vec<_>>(), vec!["service"]);
    }

    #[test]
    fn test_affixes_skip_whole_identifier() {
        let (prefixes, suffixes) = affixes("handle");
        assert!(prefixes.is_empty());
        assert!(suffixes.is_empty());
        let (prefixes, suffixes) = affixes("run");
        assert!(prefixes.is_empty() && suffixes.is_empty());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("payment"), "Payment");
        assert_eq!(capitalize(""), "");
    }
}
