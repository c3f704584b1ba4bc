//! Builder configuration
//!
//! Settings that shape convention output. Loadable from TOML; every field has a
//! default so an empty document is a valid configuration.

use modelforge_core::{MetadataError, MetadataResult, Validatable};
use serde::{Deserialize, Serialize};

// ============================================================================
// NamingStyle
// ============================================================================

/// Casing used for generated property names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingStyle {
    /// `CustomerId`
    #[default]
    Pascal,
    /// `customer_id`
    Snake,
}

impl NamingStyle {
    pub fn display_name(&self) -> &'static str {
        match self {
            NamingStyle::Pascal => "PascalCase",
            NamingStyle::Snake => "snake_case",
        }
    }
}

// ============================================================================
// BuilderConfig
// ============================================================================

/// Configuration for a model builder session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Casing for generated foreign key property names
    pub naming: NamingStyle,

    /// Suffix identifying key properties (`Id`, `<Type>Id`)
    pub key_suffix: String,

    /// Upper bound on convention events processed per facade call
    pub max_convention_iterations: usize,

    /// Names of default conventions to leave out
    pub disabled_conventions: Vec<String>,

    /// Run the model validator in `finish`
    pub validate_on_finish: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            naming: NamingStyle::Pascal,
            key_suffix: "Id".to_string(),
            max_convention_iterations: 10_000,
            disabled_conventions: Vec::new(),
            validate_on_finish: true,
        }
    }
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> MetadataResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_naming(mut self, naming: NamingStyle) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = suffix.into();
        self
    }

    pub fn with_disabled_convention(mut self, name: impl Into<String>) -> Self {
        self.disabled_conventions.push(name.into());
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validate_on_finish = false;
        self
    }

    /// Check if a convention is enabled
    pub fn is_enabled(&self, convention: &str) -> bool {
        !self.disabled_conventions.iter().any(|c| c == convention)
    }
}

impl Validatable for BuilderConfig {
    fn validate(&self) -> MetadataResult<()> {
        if self.key_suffix.trim().is_empty() {
            return Err(MetadataError::InvalidConfig(
                "key_suffix cannot be empty".to_string(),
            ));
        }
        if self.max_convention_iterations == 0 {
            return Err(MetadataError::InvalidConfig(
                "max_convention_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuilderConfig::default();
        assert_eq!(config.naming, NamingStyle::Pascal);
        assert_eq!(config.key_suffix, "Id");
        assert!(config.validate_on_finish);
        assert!(config.is_valid());
    }

    #[test]
    fn test_from_toml() {
        let config = BuilderConfig::from_toml_str(
            r#"
            naming = "snake"
            disabled_conventions = ["foreign_key_index"]
            "#,
        )
        .unwrap();
        assert_eq!(config.naming, NamingStyle::Snake);
        assert_eq!(config.key_suffix, "Id");
        assert!(!config.is_enabled("foreign_key_index"));
        assert!(config.is_enabled("key_discovery"));
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(BuilderConfig::from_toml_str("").unwrap(), BuilderConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        let err = BuilderConfig::from_toml_str("max_convention_iterations = 0").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidConfig(_)));

        let err = BuilderConfig::from_toml_str("naming = 3").unwrap_err();
        assert!(matches!(err, MetadataError::ConfigParse(_)));
    }
}
