//! Key and index definitions

use crate::arena::{EntityTypeId, IndexId, KeyId, PropertyId};
use modelforge_core::{Annotations, ConfigurationSource, Configured, SetOutcome};

// ============================================================================
// Key
// ============================================================================

/// An ordered list of properties whose values identify an instance
#[derive(Debug, Clone)]
pub struct Key {
    pub(crate) id: KeyId,
    pub(crate) entity: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) configuration_source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Key {
    pub(crate) fn new(
        id: KeyId,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            id,
            entity,
            properties,
            configuration_source: source,
            annotations: Annotations::new(),
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn entity(&self) -> EntityTypeId {
        self.entity
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.configuration_source
    }

    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.configuration_source = source.max(Some(self.configuration_source));
    }
}

crate::impl_annotatable!(Key);

// ============================================================================
// Index
// ============================================================================

/// An ordered list of properties to be indexed, optionally unique
#[derive(Debug, Clone)]
pub struct Index {
    pub(crate) id: IndexId,
    pub(crate) entity: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) is_unique: Configured<bool>,
    pub(crate) configuration_source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Index {
    pub(crate) fn new(
        id: IndexId,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            id,
            entity,
            properties,
            is_unique: Configured::new(false),
            configuration_source: source,
            annotations: Annotations::new(),
        }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    pub fn entity(&self) -> EntityTypeId {
        self.entity
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn is_unique(&self) -> bool {
        *self.is_unique.get()
    }

    pub fn uniqueness_source(&self) -> Option<ConfigurationSource> {
        self.is_unique.source()
    }

    pub fn set_unique(&mut self, unique: bool, source: ConfigurationSource) -> SetOutcome {
        self.is_unique.try_set(unique, source)
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.configuration_source
    }

    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.configuration_source = source.max(Some(self.configuration_source));
    }
}

crate::impl_annotatable!(Index);
