//! Property definitions
//!
//! A property is a scalar member of an entity type. Shadow properties have no
//! backing member and get a dense shadow index within their entity type.

use crate::arena::{EntityTypeId, PropertyId};
use modelforge_core::{Annotations, ConfigurationSource, Configured, SetOutcome, TriState, ValueType};

// ============================================================================
// Property
// ============================================================================

/// A scalar member of an entity type
#[derive(Debug, Clone)]
pub struct Property {
    pub(crate) id: PropertyId,
    pub(crate) entity: EntityTypeId,
    pub(crate) name: String,

    pub(crate) value_type: Configured<ValueType>,

    /// No backing member
    pub(crate) is_shadow: bool,

    /// Dense position among the entity type's shadow properties
    pub(crate) shadow_index: Option<usize>,

    pub(crate) is_nullable: Configured<bool>,
    pub(crate) is_concurrency_token: Configured<bool>,
    pub(crate) generate_value_on_add: Configured<bool>,
    pub(crate) is_store_computed: Configured<TriState>,
    pub(crate) use_store_default: Configured<bool>,
    pub(crate) max_length: Configured<Option<usize>>,

    pub(crate) configuration_source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Property {
    pub(crate) fn new(
        id: PropertyId,
        entity: EntityTypeId,
        name: String,
        value_type: ValueType,
        is_shadow: bool,
        source: ConfigurationSource,
    ) -> Self {
        let nullable = value_type.is_nullable();
        Self {
            id,
            entity,
            name,
            value_type: Configured::with_source(value_type, source),
            is_shadow,
            shadow_index: None,
            is_nullable: Configured::new(nullable),
            is_concurrency_token: Configured::new(false),
            generate_value_on_add: Configured::new(false),
            is_store_computed: Configured::new(TriState::Unset),
            use_store_default: Configured::new(false),
            max_length: Configured::new(None),
            configuration_source: source,
            annotations: Annotations::new(),
        }
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Declaring entity type
    pub fn entity(&self) -> EntityTypeId {
        self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shadow(&self) -> bool {
        self.is_shadow
    }

    pub fn shadow_index(&self) -> Option<usize> {
        self.shadow_index
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.configuration_source
    }

    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.configuration_source = source.max(Some(self.configuration_source));
    }

    // ========================================================================
    // Value type and nullability
    // ========================================================================

    pub fn value_type(&self) -> &ValueType {
        self.value_type.get()
    }

    pub fn value_type_source(&self) -> Option<ConfigurationSource> {
        self.value_type.source()
    }

    /// Change the value type
    ///
    /// Nullability follows the new type unless it was configured.
    pub fn set_value_type(&mut self, value_type: ValueType, source: ConfigurationSource) -> SetOutcome {
        let outcome = self.value_type.try_set(value_type, source);
        if outcome.is_updated() && self.is_nullable.source().is_none() {
            self.is_nullable.replace(self.value_type.get().is_nullable());
        }
        outcome
    }

    pub fn is_nullable(&self) -> bool {
        *self.is_nullable.get()
    }

    pub fn nullability_source(&self) -> Option<ConfigurationSource> {
        self.is_nullable.source()
    }

    /// Check if the value type admits null at all
    pub fn can_be_nullable(&self) -> bool {
        self.value_type.get().is_nullable()
    }

    /// Set nullability; callers check `can_be_nullable` first
    pub fn set_nullable(&mut self, nullable: bool, source: ConfigurationSource) -> SetOutcome {
        self.is_nullable.try_set(nullable, source)
    }

    pub(crate) fn force_non_nullable(&mut self) {
        self.is_nullable.replace(false);
    }

    // ========================================================================
    // Facets
    // ========================================================================

    pub fn is_concurrency_token(&self) -> bool {
        *self.is_concurrency_token.get()
    }

    pub fn set_concurrency_token(&mut self, value: bool, source: ConfigurationSource) -> SetOutcome {
        self.is_concurrency_token.try_set(value, source)
    }

    pub fn generate_value_on_add(&self) -> bool {
        *self.generate_value_on_add.get()
    }

    pub fn generate_value_on_add_source(&self) -> Option<ConfigurationSource> {
        self.generate_value_on_add.source()
    }

    pub fn set_generate_value_on_add(
        &mut self,
        value: bool,
        source: ConfigurationSource,
    ) -> SetOutcome {
        self.generate_value_on_add.try_set(value, source)
    }

    pub fn is_store_computed(&self) -> TriState {
        *self.is_store_computed.get()
    }

    pub fn set_store_computed(&mut self, value: TriState, source: ConfigurationSource) -> SetOutcome {
        self.is_store_computed.try_set(value, source)
    }

    pub fn use_store_default(&self) -> bool {
        *self.use_store_default.get()
    }

    pub fn set_use_store_default(&mut self, value: bool, source: ConfigurationSource) -> SetOutcome {
        self.use_store_default.try_set(value, source)
    }

    pub fn max_length(&self) -> Option<usize> {
        *self.max_length.get()
    }

    pub fn set_max_length(&mut self, value: Option<usize>, source: ConfigurationSource) -> SetOutcome {
        self.max_length.try_set(value, source)
    }
}

crate::impl_annotatable!(Property);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn property(value_type: ValueType) -> Property {
        Property::new(
            PropertyId::new(0),
            EntityTypeId::new(0),
            "CustomerId".to_string(),
            value_type,
            true,
            ConfigurationSource::Convention,
        )
    }

    #[test]
    fn test_nullability_follows_type() {
        assert!(!property(ValueType::Int32).is_nullable());
        assert!(property(ValueType::String).is_nullable());
        assert!(property(ValueType::optional(ValueType::Int32)).can_be_nullable());
    }

    #[test]
    fn test_set_value_type_updates_unconfigured_nullability() {
        let mut property = property(ValueType::optional(ValueType::Int32));
        assert!(property.is_nullable());
        let outcome = property.set_value_type(ValueType::Int32, ConfigurationSource::Explicit);
        assert_eq!(outcome, SetOutcome::Updated);
        assert!(!property.is_nullable());
    }

    #[test]
    fn test_set_value_type_keeps_configured_nullability() {
        let mut property = property(ValueType::String);
        property.set_nullable(false, ConfigurationSource::Explicit);
        property.set_value_type(ValueType::Bytes, ConfigurationSource::Explicit);
        assert!(!property.is_nullable());
    }

    #[test]
    fn test_facets_respect_sources() {
        let mut property = property(ValueType::String);
        assert_eq!(
            property.set_max_length(Some(64), ConfigurationSource::DataAnnotation),
            SetOutcome::Updated
        );
        assert_eq!(
            property.set_max_length(Some(32), ConfigurationSource::Convention),
            SetOutcome::Rejected
        );
        assert_eq!(property.max_length(), Some(64));

        property.set_store_computed(TriState::True, ConfigurationSource::Explicit);
        assert_eq!(property.is_store_computed(), TriState::True);
    }
}
