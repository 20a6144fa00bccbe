//! Named regex definitions shared between analyzers.
use regex::Regex;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionCategory {
    /// Identifier casing conventions.
    Naming,
    /// Role suffixes such as `*Controller`.
    StructuralSuffix,
    /// Whole-name shapes such as test files or `useX` hooks.
    Shape,
}

#[derive(Debug, Clone)]
pub struct PatternDefinition {
    pub name: String,
    pub category: DefinitionCategory,
    pub regex: Regex,
    pub description: String,
}

impl PatternDefinition {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Registry of pattern definitions, kept in registration order.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    definitions: Vec<PatternDefinition>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition. Names are unique; re-registering the same name
    /// with the same regex is a no-op so analyzers can share baseline entries.
    pub fn register(
        &mut self,
        name: &str,
        category: DefinitionCategory,
        pattern: &str,
        description: &str,
    ) -> Result<()> {
        if let Some(existing) = self.get(name) {
            if existing.regex.as_str() == pattern && existing.category == category {
                return Ok(());
            }
            return Err(AnalysisError::Pattern {
                name: name.to_string(),
                message: "already registered with a different definition".to_string(),
            });
        }

        let regex = Regex::new(pattern).map_err(|e| AnalysisError::Pattern {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        self.definitions.push(PatternDefinition {
            name: name.to_string(),
            category,
            regex,
            description: description.to_string(),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PatternDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn in_category(
        &self,
        category: DefinitionCategory,
    ) -> impl Iterator<Item = &PatternDefinition> {
        self.definitions.iter().filter(move |d| d.category == category)
    }

    /// Definitions of `category` whose regex matches `text`.
    pub fn matching<'a, 't>(
        &'a self,
        category: DefinitionCategory,
        text: &'t str,
    ) -> impl Iterator<Item = &'a PatternDefinition> + use<'a, 't> {
        self.in_category(category).filter(move |d| d.is_match(text))
    }

    pub fn first_match<'a>(&'a self, category: DefinitionCategory, text: &str) -> Option<&'a PatternDefinition> {
        self.matching(category, text).next()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_match() {
        let mut registry = PatternRegistry::new();
        registry
            .register("suffix:Service", DefinitionCategory::StructuralSuffix, "(?i)service$", "")
            .unwrap();
        registry
            .register("suffix:Factory", DefinitionCategory::StructuralSuffix, "(?i)factory$", "")
            .unwrap();

        let hit = registry
            .first_match(DefinitionCategory::StructuralSuffix, "user-service")
            .unwrap();
        assert_eq!(hit.name, "suffix:Service");
        assert!(registry.first_match(DefinitionCategory::Naming, "user-service").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregister_same_is_noop() {
        let mut registry = PatternRegistry::new();
        registry.register("a", DefinitionCategory::Shape, "^a$", "").unwrap();
        registry.register("a", DefinitionCategory::Shape, "^a$", "").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.register("a", DefinitionCategory::Shape, "^b$", "").is_err());
    }

    #[test]
    fn test_bad_regex_is_rejected() {
        let mut registry = PatternRegistry::new();
        let err = registry
            .register("broken", DefinitionCategory::Shape, "(unclosed", "")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Pattern { .. }));
        assert!(registry.is_empty());
    }
}
