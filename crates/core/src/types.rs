//! Core types used throughout modelforge
//!
//! This module contains the configuration-source tracker that decides whether a
//! new configuration attempt may override existing state, plus the value types
//! declared by properties.

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Source
// ============================================================================

/// Provenance of a piece of metadata, ordered by strength
///
/// `Convention < DataAnnotation < Explicit`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationSource {
    /// Inferred by a convention
    Convention,
    /// Read from an attribute on the backing member
    DataAnnotation,
    /// Set by a user configuration call
    Explicit,
}

impl ConfigurationSource {
    /// Whether `new` may overwrite a fact currently held at `current`
    ///
    /// Unset facts can always be set.
    pub fn can_set(current: Option<Self>, new: Self) -> bool {
        current.map_or(true, |current| new >= current)
    }

    /// Whether this source may overwrite a fact held at `current`
    pub fn overrides(self, current: Option<Self>) -> bool {
        Self::can_set(current, self)
    }

    /// The stronger of this source and `other`
    pub fn max(self, other: Option<Self>) -> Self {
        match other {
            Some(other) if other > self => other,
            _ => self,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ConfigurationSource::Convention => "Convention",
            ConfigurationSource::DataAnnotation => "DataAnnotation",
            ConfigurationSource::Explicit => "Explicit",
        }
    }

    /// Get all sources, weakest first
    pub fn all() -> &'static [ConfigurationSource] {
        &[
            ConfigurationSource::Convention,
            ConfigurationSource::DataAnnotation,
            ConfigurationSource::Explicit,
        ]
    }
}

impl std::fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Configured Values
// ============================================================================

/// Outcome of a `Configured::try_set` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOutcome {
    /// The value was already in place (its source may have been upgraded)
    Unchanged,
    /// The value changed
    Updated,
    /// The stored source is stronger than the caller's
    Rejected,
}

impl SetOutcome {
    /// Check if the attempt was rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self, SetOutcome::Rejected)
    }

    /// Check if the value changed
    pub fn is_updated(&self) -> bool {
        matches!(self, SetOutcome::Updated)
    }
}

/// A value paired with the source that configured it
///
/// A fact with no source has never been configured and holds its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configured<T> {
    value: T,
    source: Option<ConfigurationSource>,
}

impl<T: Clone + PartialEq> Configured<T> {
    /// Create an unconfigured fact holding a default value
    pub fn new(value: T) -> Self {
        Self {
            value,
            source: None,
        }
    }

    /// Create a fact configured at `source`
    pub fn with_source(value: T, source: ConfigurationSource) -> Self {
        Self {
            value,
            source: Some(source),
        }
    }

    /// Get the current value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Get a clone of the current value
    pub fn value(&self) -> T {
        self.value.clone()
    }

    /// Get the source that configured the current value
    pub fn source(&self) -> Option<ConfigurationSource> {
        self.source
    }

    /// Whether `source` may change this fact
    pub fn can_set(&self, source: ConfigurationSource) -> bool {
        ConfigurationSource::can_set(self.source, source)
    }

    /// Attempt to set the value at `source`
    ///
    /// Reconfirming the current value upgrades the stored source even when
    /// nothing else changes.
    pub fn try_set(&mut self, value: T, source: ConfigurationSource) -> SetOutcome {
        if self.value == value {
            self.source = Some(source.max(self.source));
            return SetOutcome::Unchanged;
        }
        if !self.can_set(source) {
            return SetOutcome::Rejected;
        }
        self.value = value;
        self.source = Some(source.max(self.source));
        SetOutcome::Updated
    }

    /// Replace the value without touching the source
    ///
    /// Used for structural updates that follow from another decision, such as
    /// a navigation slot being emptied when its navigation is removed.
    pub fn replace(&mut self, value: T) -> T {
        std::mem::replace(&mut self.value, value)
    }

    /// Upgrade the stored source without changing the value
    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.source = Some(source.max(self.source));
    }
}

impl<T: Clone + PartialEq + Default> Default for Configured<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// ============================================================================
// TriState
// ============================================================================

/// Three-valued flag: unset, true or false
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    #[default]
    Unset,
    True,
    False,
}

impl TriState {
    /// Convert to an optional boolean
    pub fn as_option(&self) -> Option<bool> {
        match self {
            TriState::Unset => None,
            TriState::True => Some(true),
            TriState::False => Some(false),
        }
    }

    /// Check if a value has been set
    pub fn is_set(&self) -> bool {
        !matches!(self, TriState::Unset)
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => TriState::Unset,
            Some(true) => TriState::True,
            Some(false) => TriState::False,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

// ============================================================================
// Value Types
// ============================================================================

/// Declared value type of a property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of")]
pub enum ValueType {
    Bool,
    Byte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Float32,
    Float64,
    Char,
    Guid,
    DateTime,
    TimeSpan,
    /// Reference type, always nullable
    String,
    /// Reference type, always nullable
    Bytes,
    /// Nullable wrapper around a value type
    Optional(Box<ValueType>),
}

impl ValueType {
    /// Create a nullable wrapper
    pub fn optional(inner: ValueType) -> Self {
        inner.to_nullable()
    }

    /// Check if values of this type can be null
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            ValueType::Optional(_) | ValueType::String | ValueType::Bytes
        )
    }

    /// Check if this is a reference type (nullable without a wrapper)
    pub fn is_reference_type(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Bytes)
    }

    /// Get the type with any nullable wrapper removed
    pub fn underlying(&self) -> &ValueType {
        match self {
            ValueType::Optional(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Get the nullable counterpart of this type
    pub fn to_nullable(&self) -> ValueType {
        if self.is_nullable() {
            self.clone()
        } else {
            ValueType::Optional(Box::new(self.clone()))
        }
    }

    /// Get the non-nullable counterpart of this type
    pub fn to_non_nullable(&self) -> ValueType {
        self.underlying().clone()
    }

    /// Check if two types store the same values, ignoring nullability
    pub fn is_compatible_with(&self, other: &ValueType) -> bool {
        self.underlying() == other.underlying()
    }

    /// Check if values of this type are usually generated by the store
    pub fn is_generated_key_type(&self) -> bool {
        matches!(
            self.underlying(),
            ValueType::Int16 | ValueType::Int32 | ValueType::Int64 | ValueType::Guid
        )
    }

    /// Get a user-friendly display name
    pub fn display_name(&self) -> String {
        match self {
            ValueType::Bool => "bool".to_string(),
            ValueType::Byte => "byte".to_string(),
            ValueType::Int16 => "short".to_string(),
            ValueType::Int32 => "int".to_string(),
            ValueType::Int64 => "long".to_string(),
            ValueType::Decimal => "decimal".to_string(),
            ValueType::Float32 => "float".to_string(),
            ValueType::Float64 => "double".to_string(),
            ValueType::Char => "char".to_string(),
            ValueType::Guid => "Guid".to_string(),
            ValueType::DateTime => "DateTime".to_string(),
            ValueType::TimeSpan => "TimeSpan".to_string(),
            ValueType::String => "string".to_string(),
            ValueType::Bytes => "byte[]".to_string(),
            ValueType::Optional(inner) => format!("{}?", inner.display_name()),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_ordering() {
        use ConfigurationSource::*;
        assert!(Convention < DataAnnotation);
        assert!(DataAnnotation < Explicit);
        assert!(ConfigurationSource::can_set(None, Convention));
        assert!(ConfigurationSource::can_set(Some(Convention), Convention));
        assert!(ConfigurationSource::can_set(Some(Convention), Explicit));
        assert!(!ConfigurationSource::can_set(Some(Explicit), DataAnnotation));
        assert_eq!(Convention.max(Some(Explicit)), Explicit);
        assert_eq!(Explicit.max(Some(Convention)), Explicit);
        assert_eq!(DataAnnotation.max(None), DataAnnotation);
    }

    #[test]
    fn test_configured_try_set() {
        let mut fact = Configured::new(false);
        assert_eq!(fact.source(), None);

        assert_eq!(
            fact.try_set(true, ConfigurationSource::Explicit),
            SetOutcome::Updated
        );
        assert_eq!(
            fact.try_set(false, ConfigurationSource::Convention),
            SetOutcome::Rejected
        );
        assert!(*fact.get());
        assert_eq!(fact.source(), Some(ConfigurationSource::Explicit));
    }

    #[test]
    fn test_configured_reconfirm_upgrades_source() {
        let mut fact = Configured::with_source(3usize, ConfigurationSource::Convention);
        assert_eq!(
            fact.try_set(3, ConfigurationSource::Explicit),
            SetOutcome::Unchanged
        );
        assert_eq!(fact.source(), Some(ConfigurationSource::Explicit));

        // A weaker reconfirmation never downgrades
        fact.try_set(3, ConfigurationSource::Convention);
        assert_eq!(fact.source(), Some(ConfigurationSource::Explicit));
    }

    #[test]
    fn test_value_type_nullability() {
        assert!(!ValueType::Int32.is_nullable());
        assert!(ValueType::String.is_nullable());
        assert!(ValueType::optional(ValueType::Int32).is_nullable());
        assert_eq!(ValueType::String.to_nullable(), ValueType::String);
        assert_eq!(
            ValueType::Int32.to_nullable(),
            ValueType::Optional(Box::new(ValueType::Int32))
        );
        assert_eq!(
            ValueType::optional(ValueType::Guid).to_non_nullable(),
            ValueType::Guid
        );
    }

    #[test]
    fn test_value_type_compatibility() {
        let nullable_int = ValueType::optional(ValueType::Int32);
        assert!(ValueType::Int32.is_compatible_with(&nullable_int));
        assert!(!ValueType::Int64.is_compatible_with(&nullable_int));
        assert_eq!(nullable_int.to_string(), "int?");
    }

    #[test]
    fn test_tri_state() {
        assert_eq!(TriState::from(None), TriState::Unset);
        assert_eq!(TriState::from(true), TriState::True);
        assert_eq!(TriState::False.as_option(), Some(false));
        assert!(!TriState::default().is_set());
    }
}
