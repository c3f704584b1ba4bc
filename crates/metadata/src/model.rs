//! The metadata graph
//!
//! `Model` owns one arena per element kind. Elements refer to each other by
//! id only; the mutation primitives in `mutation.rs` keep the back-references
//! (entity collections, navigation slots) consistent.

use crate::arena::{
    Arena, ArenaMark, EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId,
};
use crate::entity::EntityType;
use crate::foreign_key::{ForeignKey, Navigation};
use crate::key::{Index, Key};
use crate::property::Property;
use modelforge_core::{Annotations, ConfigurationSource};
use std::collections::BTreeMap;

// ============================================================================
// Model
// ============================================================================

/// The complete metadata graph
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub(crate) entity_types: Arena<EntityTypeId, EntityType>,
    pub(crate) properties: Arena<PropertyId, Property>,
    pub(crate) keys: Arena<KeyId, Key>,
    pub(crate) foreign_keys: Arena<ForeignKeyId, ForeignKey>,
    pub(crate) navigations: Arena<NavigationId, Navigation>,
    pub(crate) indexes: Arena<IndexId, Index>,

    /// Entity type names excluded from the model
    pub(crate) ignored_entity_types: BTreeMap<String, ConfigurationSource>,

    pub(crate) annotations: Annotations,
}

/// Model state at the start of an undoable step
#[derive(Debug)]
pub struct Savepoint {
    entity_types: ArenaMark,
    properties: ArenaMark,
    keys: ArenaMark,
    foreign_keys: ArenaMark,
    navigations: ArenaMark,
    indexes: ArenaMark,
    ignored_entity_types: BTreeMap<String, ConfigurationSource>,
    annotations: Annotations,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Savepoints
    // ========================================================================

    /// Start recording changes so they can be undone
    ///
    /// Savepoints nest and must be closed innermost first, by either
    /// [`Model::rollback_to`] or [`Model::release`].
    pub fn savepoint(&mut self) -> Savepoint {
        Savepoint {
            entity_types: self.entity_types.mark(),
            properties: self.properties.mark(),
            keys: self.keys.mark(),
            foreign_keys: self.foreign_keys.mark(),
            navigations: self.navigations.mark(),
            indexes: self.indexes.mark(),
            ignored_entity_types: self.ignored_entity_types.clone(),
            annotations: self.annotations.clone(),
        }
    }

    /// Undo every change since the savepoint
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        self.entity_types.rollback(savepoint.entity_types);
        self.properties.rollback(savepoint.properties);
        self.keys.rollback(savepoint.keys);
        self.foreign_keys.rollback(savepoint.foreign_keys);
        self.navigations.rollback(savepoint.navigations);
        self.indexes.rollback(savepoint.indexes);
        self.ignored_entity_types = savepoint.ignored_entity_types;
        self.annotations = savepoint.annotations;
    }

    /// Keep every change since the savepoint
    pub fn release(&mut self, savepoint: Savepoint) {
        self.entity_types.release(savepoint.entity_types);
        self.properties.release(savepoint.properties);
        self.keys.release(savepoint.keys);
        self.foreign_keys.release(savepoint.foreign_keys);
        self.navigations.release(savepoint.navigations);
        self.indexes.release(savepoint.indexes);
    }

    // ========================================================================
    // Entity types
    // ========================================================================

    pub fn entity_type(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entity_types.get(id)
    }

    pub fn entity_type_mut(&mut self, id: EntityTypeId) -> Option<&mut EntityType> {
        self.entity_types.get_mut(id)
    }

    pub fn find_entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types().find(|e| e.name == name)
    }

    /// Entity types in declaration order
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.iter().map(|(_, entity)| entity)
    }

    pub fn entity_type_count(&self) -> usize {
        self.entity_types.len()
    }

    pub fn ignored_entity_types(&self) -> &BTreeMap<String, ConfigurationSource> {
        &self.ignored_entity_types
    }

    pub fn ignored_entity_type_source(&self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_entity_types.get(name).copied()
    }

    /// Record an entity type name as ignored, keeping the stronger source
    pub fn ignore_entity_type(&mut self, name: impl Into<String>, source: ConfigurationSource) {
        let entry = self
            .ignored_entity_types
            .entry(name.into())
            .or_insert(source);
        *entry = source.max(Some(*entry));
    }

    /// Lift an ignore when `source` is strong enough
    pub fn unignore_entity_type(&mut self, name: &str, source: ConfigurationSource) -> bool {
        match self.ignored_entity_types.get(name) {
            None => true,
            Some(current) if ConfigurationSource::can_set(Some(*current), source) => {
                self.ignored_entity_types.remove(name);
                true
            }
            Some(_) => false,
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id)
    }

    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(id)
    }

    pub fn find_property(&self, entity: EntityTypeId, name: &str) -> Option<&Property> {
        self.entity_type(entity)?
            .properties
            .iter()
            .filter_map(|id| self.properties.get(*id))
            .find(|p| p.name == name)
    }

    /// Properties of an entity type in declaration order
    pub fn properties_of(&self, entity: EntityTypeId) -> impl Iterator<Item = &Property> {
        self.entity_type(entity)
            .map(|e| e.properties.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.properties.get(*id))
    }

    /// Check if any key, foreign key or index uses the property
    pub fn is_property_in_use(&self, id: PropertyId) -> bool {
        !self.keys_containing(id).is_empty()
            || !self.foreign_keys_containing(id).is_empty()
            || !self.indexes_containing(id).is_empty()
    }

    // ========================================================================
    // Keys
    // ========================================================================

    pub fn key(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(id)
    }

    pub fn key_mut(&mut self, id: KeyId) -> Option<&mut Key> {
        self.keys.get_mut(id)
    }

    /// Find a key over exactly these properties, in this order
    pub fn find_key(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<&Key> {
        self.entity_type(entity)?
            .keys
            .iter()
            .filter_map(|id| self.keys.get(*id))
            .find(|k| k.properties == properties)
    }

    pub fn primary_key(&self, entity: EntityTypeId) -> Option<&Key> {
        self.entity_type(entity)?
            .primary_key()
            .and_then(|id| self.keys.get(id))
    }

    pub fn is_primary_key(&self, key: KeyId) -> bool {
        self.keys
            .get(key)
            .and_then(|k| self.entity_type(k.entity))
            .is_some_and(|e| e.primary_key() == Some(key))
    }

    pub fn keys_containing(&self, property: PropertyId) -> Vec<KeyId> {
        self.keys
            .iter()
            .filter(|(_, k)| k.properties.contains(&property))
            .map(|(id, _)| id)
            .collect()
    }

    // ========================================================================
    // Foreign keys
    // ========================================================================

    pub fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKey> {
        self.foreign_keys.get(id)
    }

    pub fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Option<&mut ForeignKey> {
        self.foreign_keys.get_mut(id)
    }

    /// All foreign keys in creation order
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter().map(|(_, fk)| fk)
    }

    /// Foreign keys declared on `entity` as the dependent
    pub fn foreign_keys_of(&self, entity: EntityTypeId) -> impl Iterator<Item = &ForeignKey> {
        self.entity_type(entity)
            .map(|e| e.foreign_keys.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.foreign_keys.get(*id))
    }

    /// Foreign keys whose principal is `entity`
    pub fn referencing_foreign_keys(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.principal == entity)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn foreign_keys_referencing_key(&self, key: KeyId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.principal_key == key)
            .map(|(id, _)| id)
            .collect()
    }

    /// Foreign keys between two entity types, in either orientation
    pub fn foreign_keys_between(&self, a: EntityTypeId, b: EntityTypeId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.connects(a, b))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn foreign_keys_containing(&self, property: PropertyId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .iter()
            .filter(|(_, fk)| fk.properties.contains(&property))
            .map(|(id, _)| id)
            .collect()
    }

    // ========================================================================
    // Navigations
    // ========================================================================

    pub fn navigation(&self, id: NavigationId) -> Option<&Navigation> {
        self.navigations.get(id)
    }

    pub fn navigation_mut(&mut self, id: NavigationId) -> Option<&mut Navigation> {
        self.navigations.get_mut(id)
    }

    pub fn find_navigation(&self, entity: EntityTypeId, name: &str) -> Option<&Navigation> {
        self.navigations_of(entity).find(|n| n.name == name)
    }

    /// Navigations declared on `entity` in declaration order
    pub fn navigations_of(&self, entity: EntityTypeId) -> impl Iterator<Item = &Navigation> {
        self.entity_type(entity)
            .map(|e| e.navigations.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.navigations.get(*id))
    }

    /// Entity type a navigation points at
    pub fn navigation_target(&self, id: NavigationId) -> Option<EntityTypeId> {
        let navigation = self.navigation(id)?;
        let fk = self.foreign_key(navigation.foreign_key)?;
        Some(if navigation.points_to_principal {
            fk.principal
        } else {
            fk.dependent
        })
    }

    /// A navigation to the dependents of a non-unique foreign key is a collection
    pub fn is_collection_navigation(&self, id: NavigationId) -> bool {
        self.navigation(id)
            .filter(|n| !n.points_to_principal)
            .and_then(|n| self.foreign_key(n.foreign_key))
            .is_some_and(|fk| !fk.is_unique())
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    pub fn index(&self, id: IndexId) -> Option<&Index> {
        self.indexes.get(id)
    }

    pub fn index_mut(&mut self, id: IndexId) -> Option<&mut Index> {
        self.indexes.get_mut(id)
    }

    /// Find an index over exactly these properties, in this order
    pub fn find_index(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<&Index> {
        self.indexes_of(entity).find(|i| i.properties == properties)
    }

    pub fn indexes_of(&self, entity: EntityTypeId) -> impl Iterator<Item = &Index> {
        self.entity_type(entity)
            .map(|e| e.indexes.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.indexes.get(*id))
    }

    pub fn indexes_containing(&self, property: PropertyId) -> Vec<IndexId> {
        self.indexes
            .iter()
            .filter(|(_, i)| i.properties.contains(&property))
            .map(|(id, _)| id)
            .collect()
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    // ========================================================================
    // Display helpers
    // ========================================================================

    /// Name of an entity type, or its id when it no longer exists
    pub fn entity_name(&self, id: EntityTypeId) -> String {
        self.entity_type(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn property_name(&self, id: PropertyId) -> String {
        self.property(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Comma separated property names
    pub fn property_names(&self, ids: &[PropertyId]) -> String {
        ids.iter()
            .map(|id| self.property_name(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `Entity(Prop, ...)` for a key
    pub fn describe_key(&self, id: KeyId) -> String {
        match self.key(id) {
            Some(key) => format!(
                "{}({})",
                self.entity_name(key.entity),
                self.property_names(&key.properties)
            ),
            None => id.to_string(),
        }
    }

    /// `Dependent(Props) -> Principal(KeyProps)` for a foreign key
    pub fn describe_foreign_key(&self, id: ForeignKeyId) -> String {
        match self.foreign_key(id) {
            Some(fk) => format!(
                "{}({}) -> {}",
                self.entity_name(fk.dependent),
                self.property_names(&fk.properties),
                self.describe_key(fk.principal_key)
            ),
            None => id.to_string(),
        }
    }
}
