//! Conventions
//!
//! A convention reacts to model events by filling in metadata nobody
//! configured: properties and keys found on backing types, relationships
//! implied by navigation members, foreign key indexes and so on. Every
//! change a convention makes is at `Convention` (or `DataAnnotation`) source,
//! so explicit configuration always wins.

mod data_annotations;
mod foreign_key_index;
mod foreign_key_property_discovery;
mod key_discovery;
mod property_discovery;
mod relationship_discovery;
mod required_derivation;
mod unreachable_entity_types;

pub use data_annotations::DataAnnotationConvention;
pub use foreign_key_index::ForeignKeyIndexConvention;
pub use foreign_key_property_discovery::ForeignKeyPropertyDiscoveryConvention;
pub use key_discovery::KeyDiscoveryConvention;
pub use property_discovery::PropertyDiscoveryConvention;
pub use relationship_discovery::RelationshipDiscoveryConvention;
pub use required_derivation::RequiredDerivationConvention;
pub use unreachable_entity_types::UnreachableEntityTypeConvention;

pub(crate) use unreachable_entity_types::sweep as sweep_unreachable;

use crate::config::BuilderConfig;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::MetadataResult;
use std::rc::Rc;

// ============================================================================
// Convention
// ============================================================================

/// Trait for conventions
pub trait Convention {
    /// Get the convention name
    fn name(&self) -> &'static str;

    /// Get the convention description
    fn description(&self) -> &'static str;

    /// React to one model event
    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()>;
}

// ============================================================================
// ConventionSet
// ============================================================================

/// Ordered conventions run for every event
#[derive(Clone, Default)]
pub struct ConventionSet {
    conventions: Vec<Rc<dyn Convention>>,
}

impl ConventionSet {
    /// Create an empty convention set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set with all default conventions
    pub fn with_default_conventions() -> Self {
        let mut set = Self::new();
        set.add(PropertyDiscoveryConvention);
        set.add(DataAnnotationConvention);
        set.add(KeyDiscoveryConvention);
        set.add(RelationshipDiscoveryConvention);
        set.add(ForeignKeyPropertyDiscoveryConvention);
        set.add(RequiredDerivationConvention);
        set.add(ForeignKeyIndexConvention);
        set.add(UnreachableEntityTypeConvention);
        set
    }

    /// Default conventions minus those the configuration disables
    pub fn for_config(config: &BuilderConfig) -> Self {
        let mut set = Self::with_default_conventions();
        set.conventions.retain(|c| config.is_enabled(c.name()));
        set
    }

    /// Append a convention
    pub fn add(&mut self, convention: impl Convention + 'static) {
        self.conventions.push(Rc::new(convention));
    }

    pub fn with(mut self, convention: impl Convention + 'static) -> Self {
        self.add(convention);
        self
    }

    /// Drop the convention of this name
    pub fn without(mut self, name: &str) -> Self {
        self.conventions.retain(|c| c.name() != name);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Convention> {
        self.conventions.iter().map(|c| c.as_ref())
    }

    /// Get the names of all conventions in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.conventions.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.conventions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }
}

impl std::fmt::Debug for ConventionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_conventions() {
        let set = ConventionSet::with_default_conventions();
        assert_eq!(set.len(), 8);
        assert_eq!(set.names()[0], "property_discovery");
        assert!(set.names().contains(&"unreachable_entity_types"));
    }

    #[test]
    fn test_for_config_drops_disabled() {
        let config = BuilderConfig::default().with_disabled_convention("foreign_key_index");
        let set = ConventionSet::for_config(&config);
        assert_eq!(set.len(), 7);
        assert!(!set.names().contains(&"foreign_key_index"));
    }

    #[test]
    fn test_without() {
        let set = ConventionSet::with_default_conventions().without("key_discovery");
        assert!(!set.names().contains(&"key_discovery"));
        assert!(ConventionSet::new().is_empty());
    }
}
