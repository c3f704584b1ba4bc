//! Entity type definitions
//!
//! An entity type owns its properties, keys, foreign keys (as dependent),
//! navigations and indexes. The collections hold ids in declaration order;
//! the elements themselves live in the model's arenas.

use crate::arena::{EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId};
use modelforge_core::{Annotations, ConfigurationSource, Configured, short_name};
use std::collections::BTreeMap;

// ============================================================================
// EntityType
// ============================================================================

/// A named type mapped by the model
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) id: EntityTypeId,

    /// Unique name within the model (possibly namespaced)
    pub(crate) name: String,

    /// Backing type, `None` for a shadow entity type
    pub(crate) clr_type: Option<String>,

    pub(crate) configuration_source: ConfigurationSource,

    pub(crate) properties: Vec<PropertyId>,
    pub(crate) keys: Vec<KeyId>,
    pub(crate) primary_key: Configured<Option<KeyId>>,

    /// Foreign keys declared on this type as the dependent
    pub(crate) foreign_keys: Vec<ForeignKeyId>,
    pub(crate) navigations: Vec<NavigationId>,
    pub(crate) indexes: Vec<IndexId>,

    /// Member names excluded from the model, with the source that excluded them
    pub(crate) ignored_members: BTreeMap<String, ConfigurationSource>,

    pub(crate) annotations: Annotations,
}

impl EntityType {
    pub(crate) fn new(
        id: EntityTypeId,
        name: String,
        clr_type: Option<String>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            id,
            name,
            clr_type,
            configuration_source: source,
            properties: Vec::new(),
            keys: Vec::new(),
            primary_key: Configured::new(None),
            foreign_keys: Vec::new(),
            navigations: Vec::new(),
            indexes: Vec::new(),
            ignored_members: BTreeMap::new(),
            annotations: Annotations::new(),
        }
    }

    pub fn id(&self) -> EntityTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without any namespace prefix
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    pub fn clr_type(&self) -> Option<&str> {
        self.clr_type.as_deref()
    }

    /// Check if the type has no backing type
    pub fn is_shadow(&self) -> bool {
        self.clr_type.is_none()
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.configuration_source
    }

    /// Raise the configuration source; never lowers it
    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.configuration_source = source.max(Some(self.configuration_source));
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    pub fn primary_key(&self) -> Option<KeyId> {
        *self.primary_key.get()
    }

    pub fn primary_key_source(&self) -> Option<ConfigurationSource> {
        self.primary_key.source()
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyId] {
        &self.foreign_keys
    }

    pub fn navigations(&self) -> &[NavigationId] {
        &self.navigations
    }

    pub fn indexes(&self) -> &[IndexId] {
        &self.indexes
    }

    // ========================================================================
    // Ignored members
    // ========================================================================

    pub fn ignored_members(&self) -> &BTreeMap<String, ConfigurationSource> {
        &self.ignored_members
    }

    pub fn ignored_member_source(&self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_members.get(name).copied()
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_members.contains_key(name)
    }

    /// Record a member as ignored, keeping the stronger source
    pub fn ignore_member(&mut self, name: impl Into<String>, source: ConfigurationSource) {
        let entry = self
            .ignored_members
            .entry(name.into())
            .or_insert(source);
        *entry = source.max(Some(*entry));
    }

    /// Lift an ignore when `source` is strong enough
    ///
    /// Returns `false` when a stronger source keeps the member ignored.
    pub fn unignore_member(&mut self, name: &str, source: ConfigurationSource) -> bool {
        match self.ignored_members.get(name) {
            None => true,
            Some(current) if ConfigurationSource::can_set(Some(*current), source) => {
                self.ignored_members.remove(name);
                true
            }
            Some(_) => false,
        }
    }
}

crate::impl_annotatable!(EntityType);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use modelforge_core::Annotatable;

    fn entity() -> EntityType {
        EntityType::new(
            EntityTypeId::new(0),
            "Shop.Customer".to_string(),
            Some("Shop.Customer".to_string()),
            ConfigurationSource::Convention,
        )
    }

    #[test]
    fn test_short_name_and_shadow() {
        let entity = entity();
        assert_eq!(entity.short_name(), "Customer");
        assert!(!entity.is_shadow());
    }

    #[test]
    fn test_upgrade_source_never_lowers() {
        let mut entity = entity();
        entity.upgrade_source(ConfigurationSource::Explicit);
        entity.upgrade_source(ConfigurationSource::DataAnnotation);
        assert_eq!(entity.configuration_source(), ConfigurationSource::Explicit);
    }

    #[test]
    fn test_ignore_member_keeps_strongest() {
        let mut entity = entity();
        entity.ignore_member("Orders", ConfigurationSource::Explicit);
        entity.ignore_member("Orders", ConfigurationSource::Convention);
        assert_eq!(
            entity.ignored_member_source("Orders"),
            Some(ConfigurationSource::Explicit)
        );

        assert!(!entity.unignore_member("Orders", ConfigurationSource::DataAnnotation));
        assert!(entity.is_ignored("Orders"));
        assert!(entity.unignore_member("Orders", ConfigurationSource::Explicit));
        assert!(!entity.is_ignored("Orders"));
    }

    #[test]
    fn test_annotations() {
        let mut entity = entity();
        entity.set_annotation("Relational:TableName", "Customers");
        assert_eq!(entity.annotation("Relational:TableName"), Some("Customers"));
    }
}
