//! Structural mutation primitives
//!
//! Every primitive checks the graph invariants before touching anything and
//! fails with a typed error, leaving the model unchanged. Primitives do not
//! cascade across relationships except where noted; callers that want
//! cascading removal remove dependents first.

use crate::arena::{EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId};
use crate::entity::EntityType;
use crate::foreign_key::{ForeignKey, Navigation};
use crate::key::{Index, Key};
use crate::model::Model;
use crate::property::Property;
use modelforge_core::{ConfigurationSource, MetadataError, MetadataResult, SetOutcome, ValueType};
use std::collections::BTreeSet;
use tracing::debug;

impl Model {
    // ========================================================================
    // Lookup guards
    // ========================================================================

    pub fn require_entity(&self, id: EntityTypeId) -> MetadataResult<&EntityType> {
        self.entity_type(id)
            .ok_or_else(|| MetadataError::EntityTypeNotFound(id.to_string()))
    }

    fn require_entity_mut(&mut self, id: EntityTypeId) -> MetadataResult<&mut EntityType> {
        self.entity_types
            .get_mut(id)
            .ok_or_else(|| MetadataError::EntityTypeNotFound(id.to_string()))
    }

    fn require_property(&self, id: PropertyId) -> MetadataResult<&Property> {
        self.property(id).ok_or_else(|| MetadataError::PropertyNotFound {
            entity: "?".to_string(),
            property: id.to_string(),
        })
    }

    fn require_key(&self, id: KeyId) -> MetadataResult<&Key> {
        self.key(id).ok_or_else(|| MetadataError::KeyNotFound {
            entity: "?".to_string(),
            properties: id.to_string(),
        })
    }

    fn require_foreign_key(&self, id: ForeignKeyId) -> MetadataResult<&ForeignKey> {
        self.foreign_key(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))
    }

    /// Check that a property list is non-empty, duplicate-free and declared on `entity`
    fn check_property_list(
        &self,
        entity: EntityTypeId,
        properties: &[PropertyId],
    ) -> MetadataResult<()> {
        let entity_type = self.require_entity(entity)?;
        if properties.is_empty() {
            return Err(MetadataError::validation(format!(
                "empty property list on entity type '{}'",
                entity_type.name
            )));
        }
        let mut seen = BTreeSet::new();
        for id in properties {
            if !entity_type.properties.contains(id) {
                return Err(MetadataError::PropertyNotFound {
                    entity: entity_type.name.clone(),
                    property: self.property_name(*id),
                });
            }
            if !seen.insert(*id) {
                return Err(MetadataError::validation(format!(
                    "property '{}' listed twice on entity type '{}'",
                    self.property_name(*id),
                    entity_type.name
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Entity types
    // ========================================================================

    pub fn add_entity_type(
        &mut self,
        name: impl Into<String>,
        clr_type: Option<String>,
        source: ConfigurationSource,
    ) -> MetadataResult<EntityTypeId> {
        let name = name.into();
        if self.find_entity_type(&name).is_some() {
            return Err(MetadataError::DuplicateEntityType(name));
        }
        debug!(entity = %name, %source, "adding entity type");
        let id = self
            .entity_types
            .insert_with(|id| EntityType::new(id, name, clr_type, source));
        Ok(id)
    }

    pub fn rename_entity_type(
        &mut self,
        id: EntityTypeId,
        new_name: impl Into<String>,
    ) -> MetadataResult<()> {
        let new_name = new_name.into();
        if let Some(existing) = self.find_entity_type(&new_name) {
            if existing.id != id {
                return Err(MetadataError::DuplicateEntityType(new_name));
            }
            return Ok(());
        }
        let entity = self.require_entity_mut(id)?;
        debug!(from = %entity.name, to = %new_name, "renaming entity type");
        entity.name = new_name;
        Ok(())
    }

    /// Remove an entity type with everything it declares and every
    /// relationship touching it
    pub fn remove_entity_type(&mut self, id: EntityTypeId) -> MetadataResult<EntityType> {
        self.require_entity(id)?;

        let touching: Vec<ForeignKeyId> = self
            .foreign_keys
            .iter()
            .filter(|(_, fk)| fk.dependent == id || fk.principal == id)
            .map(|(fk_id, _)| fk_id)
            .collect();
        for fk in touching {
            self.remove_foreign_key(fk)?;
        }

        let entity = self.require_entity_mut(id)?;
        entity.primary_key.replace(None);
        let indexes = entity.indexes.clone();
        let keys = entity.keys.clone();
        let properties = entity.properties.clone();

        for index in indexes {
            self.remove_index(index)?;
        }
        for key in keys {
            self.remove_key(key)?;
        }
        for property in properties {
            self.remove_property(property)?;
        }

        let removed = self
            .entity_types
            .remove(id)
            .ok_or_else(|| MetadataError::EntityTypeNotFound(id.to_string()))?;
        debug!(entity = %removed.name, "removed entity type");
        Ok(removed)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn add_property(
        &mut self,
        entity: EntityTypeId,
        name: impl Into<String>,
        value_type: ValueType,
        is_shadow: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<PropertyId> {
        let name = name.into();
        let entity_name = self.require_entity(entity)?.name.clone();
        if self.find_property(entity, &name).is_some() {
            return Err(MetadataError::DuplicateProperty {
                entity: entity_name,
                property: name,
            });
        }
        if self.find_navigation(entity, &name).is_some() {
            return Err(MetadataError::navigation_collision(
                entity_name,
                name,
                "a property cannot share its name with a navigation",
            ));
        }

        let shadow_index = is_shadow.then(|| {
            self.properties_of(entity)
                .filter(|p| p.is_shadow)
                .count()
        });
        debug!(entity = %entity_name, property = %name, %value_type, is_shadow, "adding property");
        let id = self.properties.insert_with(|id| {
            let mut property = Property::new(id, entity, name, value_type, is_shadow, source);
            property.shadow_index = shadow_index;
            property
        });
        self.require_entity_mut(entity)?.properties.push(id);
        Ok(id)
    }

    /// Remove a property that no key, foreign key or index uses
    pub fn remove_property(&mut self, id: PropertyId) -> MetadataResult<Property> {
        let property = self.require_property(id)?;
        let entity = property.entity;
        if self.is_property_in_use(id) {
            return Err(MetadataError::conflicting(
                format!("{}.{}", self.entity_name(entity), property.name),
                "property is used by a key, foreign key or index",
            ));
        }
        self.require_entity_mut(entity)?.properties.retain(|p| *p != id);
        let removed = self
            .properties
            .remove(id)
            .ok_or_else(|| MetadataError::internal(format!("property {id} vanished")))?;
        if removed.is_shadow {
            self.reindex_shadow_properties(entity);
        }
        debug!(property = %removed.name, "removed property");
        Ok(removed)
    }

    /// Assign dense shadow indices in declaration order
    ///
    /// `add_property` and `remove_property` keep indices dense already.
    /// Returns `true` if any index changed.
    pub fn reindex_shadow_properties(&mut self, entity: EntityTypeId) -> bool {
        let Some(entity_type) = self.entity_types.get(entity) else {
            return false;
        };
        let mut changed = false;
        let mut next = 0;
        for id in &entity_type.properties {
            let Some(property) = self.properties.get_mut(*id) else {
                continue;
            };
            let expected = if property.is_shadow {
                next += 1;
                Some(next - 1)
            } else {
                None
            };
            if property.shadow_index != expected {
                property.shadow_index = expected;
                changed = true;
            }
        }
        changed
    }

    // ========================================================================
    // Keys
    // ========================================================================

    /// Add a key; key properties become non-nullable
    pub fn add_key(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> MetadataResult<KeyId> {
        self.check_property_list(entity, &properties)?;
        let wanted: BTreeSet<PropertyId> = properties.iter().copied().collect();
        let entity_type = self.require_entity(entity)?;
        for key in entity_type.keys.iter().filter_map(|k| self.keys.get(*k)) {
            if key.properties == properties {
                return Err(MetadataError::conflicting(
                    self.describe_key(key.id),
                    "key already exists",
                ));
            }
            if key.properties.iter().copied().collect::<BTreeSet<_>>() == wanted {
                return Err(MetadataError::conflicting(
                    self.describe_key(key.id),
                    format!(
                        "a key over the same properties in a different order ({}) already exists",
                        self.property_names(&key.properties)
                    ),
                ));
            }
        }

        for id in &properties {
            if let Some(property) = self.properties.get_mut(*id) {
                property.force_non_nullable();
            }
        }
        let id = self
            .keys
            .insert_with(|id| Key::new(id, entity, properties, source));
        self.require_entity_mut(entity)?.keys.push(id);
        debug!(key = %self.describe_key(id), %source, "added key");
        Ok(id)
    }

    /// Remove a key no foreign key references; clears the primary key if needed
    pub fn remove_key(&mut self, id: KeyId) -> MetadataResult<Key> {
        let key = self.require_key(id)?;
        let entity = key.entity;
        if let Some(fk) = self.foreign_keys_referencing_key(id).first() {
            return Err(MetadataError::KeyInUse {
                entity: self.entity_name(entity),
                key: self.describe_key(id),
                foreign_key: self.describe_foreign_key(*fk),
            });
        }
        let description = self.describe_key(id);
        let entity_type = self.require_entity_mut(entity)?;
        if entity_type.primary_key() == Some(id) {
            entity_type.primary_key.replace(None);
        }
        entity_type.keys.retain(|k| *k != id);
        let removed = self
            .keys
            .remove(id)
            .ok_or_else(|| MetadataError::internal(format!("key {id} vanished")))?;
        debug!(key = %description, "removed key");
        Ok(removed)
    }

    /// Point the primary key slot at one of the entity type's keys
    pub fn set_primary_key(
        &mut self,
        entity: EntityTypeId,
        key: Option<KeyId>,
        source: ConfigurationSource,
    ) -> MetadataResult<SetOutcome> {
        if let Some(key) = key {
            let owner = self.require_key(key)?.entity;
            if owner != entity {
                return Err(MetadataError::internal(format!(
                    "key {} is not declared on '{}'",
                    self.describe_key(key),
                    self.entity_name(entity)
                )));
            }
        }
        Ok(self.require_entity_mut(entity)?.primary_key.try_set(key, source))
    }

    // ========================================================================
    // Foreign keys
    // ========================================================================

    /// Check that dependent properties line up with a principal key
    pub fn check_foreign_key_shape(
        &self,
        dependent: EntityTypeId,
        properties: &[PropertyId],
        principal_key: KeyId,
    ) -> MetadataResult<()> {
        let key = self.require_key(principal_key)?;
        if key.properties.len() != properties.len() {
            return Err(MetadataError::ForeignKeyCountMismatch {
                dependent: self.entity_name(dependent),
                dependent_properties: self.property_names(properties),
                principal: self.entity_name(key.entity),
                principal_properties: self.property_names(&key.properties),
            });
        }
        for (dependent_id, principal_id) in properties.iter().zip(&key.properties) {
            let dependent_property = self.require_property(*dependent_id)?;
            let principal_property = self.require_property(*principal_id)?;
            if !dependent_property
                .value_type()
                .is_compatible_with(principal_property.value_type())
            {
                return Err(MetadataError::ForeignKeyTypeMismatch {
                    dependent: self.entity_name(dependent),
                    dependent_property: dependent_property.name.clone(),
                    dependent_type: dependent_property.value_type().to_string(),
                    principal: self.entity_name(key.entity),
                    principal_property: principal_property.name.clone(),
                    principal_type: principal_property.value_type().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Add a foreign key; it starts required when none of its properties is nullable
    pub fn add_foreign_key(
        &mut self,
        dependent: EntityTypeId,
        properties: Vec<PropertyId>,
        principal_key: KeyId,
        source: ConfigurationSource,
    ) -> MetadataResult<ForeignKeyId> {
        self.check_property_list(dependent, &properties)?;
        self.check_foreign_key_shape(dependent, &properties, principal_key)?;
        let principal = self.require_key(principal_key)?.entity;
        let required = properties
            .iter()
            .filter_map(|p| self.property(*p))
            .all(|p| !p.is_nullable());

        let id = self.foreign_keys.insert_with(|id| {
            ForeignKey::new(
                id,
                dependent,
                principal,
                principal_key,
                properties,
                required,
                source,
            )
        });
        self.require_entity_mut(dependent)?.foreign_keys.push(id);
        debug!(foreign_key = %self.describe_foreign_key(id), %source, "added foreign key");
        Ok(id)
    }

    /// Replace the dependent properties in place, returning the old ones
    pub fn set_foreign_key_properties(
        &mut self,
        id: ForeignKeyId,
        properties: Vec<PropertyId>,
    ) -> MetadataResult<Vec<PropertyId>> {
        let fk = self.require_foreign_key(id)?;
        let (dependent, principal_key) = (fk.dependent, fk.principal_key);
        self.check_property_list(dependent, &properties)?;
        self.check_foreign_key_shape(dependent, &properties, principal_key)?;
        let fk = self
            .foreign_keys
            .get_mut(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut fk.properties, properties);
        debug!(foreign_key = %self.describe_foreign_key(id), "replaced foreign key properties");
        Ok(previous)
    }

    /// Replace the principal key and dependent properties together
    ///
    /// The new key must belong to the current principal entity type.
    pub fn set_foreign_key_reference(
        &mut self,
        id: ForeignKeyId,
        principal_key: KeyId,
        properties: Vec<PropertyId>,
    ) -> MetadataResult<()> {
        let fk = self.require_foreign_key(id)?;
        let (dependent, principal) = (fk.dependent, fk.principal);
        if self.require_key(principal_key)?.entity != principal {
            return Err(MetadataError::internal(format!(
                "key {} is not declared on principal '{}'",
                self.describe_key(principal_key),
                self.entity_name(principal)
            )));
        }
        self.check_property_list(dependent, &properties)?;
        self.check_foreign_key_shape(dependent, &properties, principal_key)?;
        let fk = self
            .foreign_keys
            .get_mut(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))?;
        fk.principal_key = principal_key;
        fk.properties = properties;
        debug!(foreign_key = %self.describe_foreign_key(id), "replaced foreign key reference");
        Ok(())
    }

    /// Remove a foreign key together with its navigations
    pub fn remove_foreign_key(&mut self, id: ForeignKeyId) -> MetadataResult<ForeignKey> {
        let fk = self.require_foreign_key(id)?;
        let navigations: Vec<NavigationId> = fk.navigations().collect();
        let dependent = fk.dependent;
        let description = self.describe_foreign_key(id);
        for navigation in navigations {
            self.remove_navigation(navigation)?;
        }
        if let Some(entity) = self.entity_types.get_mut(dependent) {
            entity.foreign_keys.retain(|f| *f != id);
        }
        let removed = self
            .foreign_keys
            .remove(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))?;
        debug!(foreign_key = %description, "removed foreign key");
        Ok(removed)
    }

    // ========================================================================
    // Navigations
    // ========================================================================

    /// Attach a navigation to an empty slot of a foreign key
    pub fn add_navigation(
        &mut self,
        foreign_key: ForeignKeyId,
        name: impl Into<String>,
        to_principal: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<NavigationId> {
        let name = name.into();
        let fk = self.require_foreign_key(foreign_key)?;
        let entity = if to_principal { fk.dependent } else { fk.principal };
        let entity_name = self.entity_name(entity);

        if fk.navigation(to_principal).is_some() {
            return Err(MetadataError::internal(format!(
                "navigation slot of {} is occupied",
                self.describe_foreign_key(foreign_key)
            )));
        }
        if !fk.can_set_navigation(to_principal, source) {
            return Err(MetadataError::conflicting(
                format!("{entity_name}.{name}"),
                format!(
                    "the navigation slot was configured at {}",
                    fk.navigation_source(to_principal)
                        .map(|s| s.display_name())
                        .unwrap_or("?")
                ),
            ));
        }
        if self.find_property(entity, &name).is_some() {
            return Err(MetadataError::navigation_collision(
                entity_name,
                name,
                "a property with this name exists",
            ));
        }
        if self.find_navigation(entity, &name).is_some() {
            return Err(MetadataError::navigation_collision(
                entity_name,
                name,
                "another navigation with this name exists",
            ));
        }

        debug!(entity = %entity_name, navigation = %name, to_principal, %source, "adding navigation");
        let id = self.navigations.insert_with(|id| Navigation {
            id,
            entity,
            name,
            foreign_key,
            points_to_principal: to_principal,
            configuration_source: source,
            annotations: Default::default(),
        });
        self.require_entity_mut(entity)?.navigations.push(id);
        if let Some(fk) = self.foreign_keys.get_mut(foreign_key) {
            fk.slot_mut(to_principal).try_set(Some(id), source);
        }
        Ok(id)
    }

    /// Remove a navigation, emptying its slot but keeping the slot's source
    pub fn remove_navigation(&mut self, id: NavigationId) -> MetadataResult<Navigation> {
        let navigation = self
            .navigation(id)
            .ok_or_else(|| MetadataError::NavigationNotFound {
                entity: "?".to_string(),
                navigation: id.to_string(),
            })?;
        let (entity, foreign_key, to_principal) = (
            navigation.entity,
            navigation.foreign_key,
            navigation.points_to_principal,
        );
        if let Some(fk) = self.foreign_keys.get_mut(foreign_key) {
            let slot = fk.slot_mut(to_principal);
            if *slot.get() == Some(id) {
                slot.replace(None);
            }
        }
        if let Some(entity) = self.entity_types.get_mut(entity) {
            entity.navigations.retain(|n| *n != id);
        }
        let removed = self
            .navigations
            .remove(id)
            .ok_or_else(|| MetadataError::internal(format!("navigation {id} vanished")))?;
        debug!(navigation = %removed.name, "removed navigation");
        Ok(removed)
    }

    /// Exchange the two navigations of a self-referencing foreign key
    pub fn swap_navigation_roles(&mut self, id: ForeignKeyId) -> MetadataResult<()> {
        let fk = self
            .foreign_keys
            .get_mut(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))?;
        if !fk.is_self_referencing() {
            return Err(MetadataError::internal(format!(
                "navigation roles can only be swapped on a self-referencing foreign key ({id})"
            )));
        }
        std::mem::swap(&mut fk.navigation_to_principal, &mut fk.navigation_to_dependent);
        let navigations: Vec<NavigationId> = fk.navigations().collect();
        for navigation in navigations {
            if let Some(navigation) = self.navigations.get_mut(navigation) {
                navigation.points_to_principal = !navigation.points_to_principal;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    pub fn add_index(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> MetadataResult<IndexId> {
        self.check_property_list(entity, &properties)?;
        if let Some(existing) = self.find_index(entity, &properties) {
            return Err(MetadataError::conflicting(
                format!(
                    "{}({})",
                    self.entity_name(entity),
                    self.property_names(&existing.properties)
                ),
                "index already exists",
            ));
        }
        let id = self
            .indexes
            .insert_with(|id| Index::new(id, entity, properties, source));
        self.require_entity_mut(entity)?.indexes.push(id);
        Ok(id)
    }

    pub fn remove_index(&mut self, id: IndexId) -> MetadataResult<Index> {
        let entity = self
            .index(id)
            .ok_or_else(|| MetadataError::internal(format!("index {id} not found")))?
            .entity;
        if let Some(entity) = self.entity_types.get_mut(entity) {
            entity.indexes.retain(|i| *i != id);
        }
        self.indexes
            .remove(id)
            .ok_or_else(|| MetadataError::internal(format!("index {id} vanished")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigurationSource::*;

    struct Shop {
        model: Model,
        customer: EntityTypeId,
        order: EntityTypeId,
        customer_id: PropertyId,
        order_customer_id: PropertyId,
        customer_pk: KeyId,
    }

    fn shop() -> Shop {
        let mut model = Model::new();
        let customer = model
            .add_entity_type("Customer", Some("Customer".into()), Explicit)
            .unwrap();
        let order = model
            .add_entity_type("Order", Some("Order".into()), Explicit)
            .unwrap();
        let customer_id = model
            .add_property(customer, "Id", ValueType::Int32, false, Convention)
            .unwrap();
        model
            .add_property(order, "Id", ValueType::Int32, false, Convention)
            .unwrap();
        let order_customer_id = model
            .add_property(order, "CustomerId", ValueType::Int32, false, Convention)
            .unwrap();
        let customer_pk = model.add_key(customer, vec![customer_id], Convention).unwrap();
        model
            .set_primary_key(customer, Some(customer_pk), Convention)
            .unwrap();
        Shop {
            model,
            customer,
            order,
            customer_id,
            order_customer_id,
            customer_pk,
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut shop = shop();
        assert!(matches!(
            shop.model.add_entity_type("Customer", None, Explicit),
            Err(MetadataError::DuplicateEntityType(_))
        ));
        assert!(matches!(
            shop.model
                .add_property(shop.customer, "Id", ValueType::Int64, false, Explicit),
            Err(MetadataError::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn test_key_in_different_order_conflicts() {
        let mut model = Model::new();
        let e = model.add_entity_type("Line", None, Explicit).unwrap();
        let a = model.add_property(e, "A", ValueType::Int32, true, Explicit).unwrap();
        let b = model.add_property(e, "B", ValueType::Int32, true, Explicit).unwrap();
        model.add_key(e, vec![a, b], Explicit).unwrap();
        let err = model.add_key(e, vec![b, a], Explicit).unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_foreign_key_defaults_and_navigations() {
        let mut shop = shop();
        let fk = shop
            .model
            .add_foreign_key(shop.order, vec![shop.order_customer_id], shop.customer_pk, Convention)
            .unwrap();
        assert!(shop.model.foreign_key(fk).unwrap().is_required());

        let to_principal = shop.model.add_navigation(fk, "Customer", true, Convention).unwrap();
        let to_dependent = shop.model.add_navigation(fk, "Orders", false, Convention).unwrap();
        assert_eq!(shop.model.navigation_target(to_principal), Some(shop.customer));
        assert!(shop.model.is_collection_navigation(to_dependent));
        assert_eq!(
            shop.model.find_navigation(shop.customer, "Orders").map(|n| n.id()),
            Some(to_dependent)
        );

        // Name collides with an existing property
        let err = shop
            .model
            .add_property(shop.customer, "Orders", ValueType::Int32, false, Explicit)
            .unwrap_err();
        assert!(matches!(err, MetadataError::NavigationNameCollision { .. }));
    }

    #[test]
    fn test_foreign_key_shape_errors() {
        let mut shop = shop();
        let name = shop
            .model
            .add_property(shop.order, "Name", ValueType::String, false, Explicit)
            .unwrap();
        let err = shop
            .model
            .add_foreign_key(shop.order, vec![name], shop.customer_pk, Explicit)
            .unwrap_err();
        assert!(matches!(err, MetadataError::ForeignKeyTypeMismatch { .. }));

        let err = shop
            .model
            .add_foreign_key(
                shop.order,
                vec![name, shop.order_customer_id],
                shop.customer_pk,
                Explicit,
            )
            .unwrap_err();
        assert!(matches!(err, MetadataError::ForeignKeyCountMismatch { .. }));
        assert_eq!(shop.model.foreign_keys().count(), 0);
    }

    #[test]
    fn test_key_in_use_and_removal_order() {
        let mut shop = shop();
        let fk = shop
            .model
            .add_foreign_key(shop.order, vec![shop.order_customer_id], shop.customer_pk, Convention)
            .unwrap();
        assert!(matches!(
            shop.model.remove_key(shop.customer_pk),
            Err(MetadataError::KeyInUse { .. })
        ));
        assert!(shop.model.remove_property(shop.order_customer_id).is_err());

        shop.model.remove_foreign_key(fk).unwrap();
        shop.model.remove_key(shop.customer_pk).unwrap();
        assert!(shop.model.primary_key(shop.customer).is_none());
        shop.model.remove_property(shop.customer_id).unwrap();
        assert!(shop.model.property(shop.customer_id).is_none());
    }

    #[test]
    fn test_remove_entity_type_cascades() {
        let mut shop = shop();
        let fk = shop
            .model
            .add_foreign_key(shop.order, vec![shop.order_customer_id], shop.customer_pk, Convention)
            .unwrap();
        let nav = shop.model.add_navigation(fk, "Orders", false, Convention).unwrap();

        shop.model.remove_entity_type(shop.customer).unwrap();
        assert!(shop.model.foreign_key(fk).is_none());
        assert!(shop.model.navigation(nav).is_none());
        assert!(shop.model.find_entity_type("Customer").is_none());
        assert_eq!(shop.model.entity_types().count(), 1);
        assert!(shop.model.entity_type(shop.order).unwrap().foreign_keys().is_empty());
    }

    #[test]
    fn test_shadow_reindexing() {
        let mut model = Model::new();
        let e = model.add_entity_type("Post", None, Explicit).unwrap();
        let a = model.add_property(e, "A", ValueType::Int32, true, Convention).unwrap();
        let b = model.add_property(e, "B", ValueType::Int32, true, Convention).unwrap();
        let c = model.add_property(e, "C", ValueType::Int32, true, Convention).unwrap();
        assert_eq!(model.property(c).unwrap().shadow_index(), Some(2));

        model.remove_property(b).unwrap();
        assert_eq!(model.property(a).unwrap().shadow_index(), Some(0));
        assert_eq!(model.property(c).unwrap().shadow_index(), Some(1));
        assert!(!model.reindex_shadow_properties(e));
    }

    #[test]
    fn test_shadow_index_unique_after_removal() {
        let mut model = Model::new();
        let e = model.add_entity_type("Post", None, Explicit).unwrap();
        let a = model.add_property(e, "A", ValueType::Int32, true, Convention).unwrap();
        model.add_property(e, "B", ValueType::Int32, true, Convention).unwrap();
        model.add_property(e, "Title", ValueType::String, false, Convention).unwrap();

        model.remove_property(a).unwrap();
        let d = model.add_property(e, "D", ValueType::Int32, true, Convention).unwrap();

        let indices: Vec<Option<usize>> =
            model.properties_of(e).map(|p| p.shadow_index()).collect();
        assert_eq!(indices, vec![Some(0), None, Some(1)]);
        assert_eq!(model.property(d).unwrap().shadow_index(), Some(1));
        assert!(crate::Validator::with_default_rules().validate(&model).is_valid());
    }

    #[test]
    fn test_savepoint_rollback_restores_graph() {
        let mut shop = shop();
        let before = crate::ModelSnapshot::from_model(&shop.model);

        let savepoint = shop.model.savepoint();
        let fk = shop
            .model
            .add_foreign_key(shop.order, vec![shop.order_customer_id], shop.customer_pk, Convention)
            .unwrap();
        shop.model.add_navigation(fk, "Orders", false, Convention).unwrap();
        shop.model.ignore_entity_type("Invoice", Explicit);
        shop.model.remove_entity_type(shop.customer).unwrap();
        shop.model.rollback_to(savepoint);

        assert_eq!(crate::ModelSnapshot::from_model(&shop.model), before);
        assert!(shop.model.foreign_key(fk).is_none());
        assert!(shop.model.ignored_entity_type_source("Invoice").is_none());
        assert_eq!(shop.model.primary_key(shop.customer).unwrap().id(), shop.customer_pk);
        let names: Vec<&str> = shop.model.entity_types().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Customer", "Order"]);
    }

    #[test]
    fn test_released_savepoint_keeps_changes() {
        let mut shop = shop();
        let outer = shop.model.savepoint();
        let inner = shop.model.savepoint();
        shop.model
            .add_property(shop.customer, "Name", ValueType::String, false, Convention)
            .unwrap();
        shop.model.release(inner);
        assert!(shop.model.find_property(shop.customer, "Name").is_some());

        shop.model.rollback_to(outer);
        assert!(shop.model.find_property(shop.customer, "Name").is_none());
    }

    #[test]
    fn test_swap_navigation_roles() {
        let mut model = Model::new();
        let node = model.add_entity_type("Node", None, Explicit).unwrap();
        let id = model.add_property(node, "Id", ValueType::Int32, false, Explicit).unwrap();
        let parent_id = model
            .add_property(node, "ParentId", ValueType::optional(ValueType::Int32), true, Explicit)
            .unwrap();
        let pk = model.add_key(node, vec![id], Explicit).unwrap();
        let fk = model.add_foreign_key(node, vec![parent_id], pk, Explicit).unwrap();
        assert!(!model.foreign_key(fk).unwrap().is_required());

        let parent = model.add_navigation(fk, "Parent", true, Explicit).unwrap();
        let children = model.add_navigation(fk, "Children", false, Explicit).unwrap();
        model.swap_navigation_roles(fk).unwrap();

        let fk = model.foreign_key(fk).unwrap();
        assert_eq!(fk.navigation_to_principal(), Some(children));
        assert_eq!(fk.navigation_to_dependent(), Some(parent));
        assert!(!model.navigation(parent).unwrap().points_to_principal());
    }

    #[test]
    fn test_stale_ids_resolve_to_none() {
        let mut shop = shop();
        let index = shop
            .model
            .add_index(shop.order, vec![shop.order_customer_id], Convention)
            .unwrap();
        shop.model.remove_index(index).unwrap();
        assert!(shop.model.index(index).is_none());
        let again = shop
            .model
            .add_index(shop.order, vec![shop.order_customer_id], Convention)
            .unwrap();
        assert_ne!(index, again);
    }
}
