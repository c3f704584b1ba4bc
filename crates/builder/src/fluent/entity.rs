use super::relationship::{CollectionNavigationBuilder, ReferenceNavigationBuilder};
use super::{set_annotation, PropertyBuilder, EXPLICIT};
use crate::internal::{InternalModelBuilder, NavigationRequest, RelationshipRequest};
use modelforge_core::{MetadataResult, ValueType};
use modelforge_metadata::{EntityType, EntityTypeId, IndexId, KeyId};

pub(crate) fn owned_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ============================================================================
// EntityBuilder
// ============================================================================

/// Configures one entity type
pub struct EntityBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    entity: EntityTypeId,
}

impl<'a> EntityBuilder<'a> {
    pub(crate) fn new(inner: &'a mut InternalModelBuilder, entity: EntityTypeId) -> Self {
        Self { inner, entity }
    }

    pub fn id(&self) -> EntityTypeId {
        self.entity
    }

    pub fn metadata(&self) -> Option<&EntityType> {
        self.inner.model().entity_type(self.entity)
    }

    /// Set the primary key, keeping a referenced previous key as an
    /// alternate key
    pub fn key(&mut self, properties: &[&str]) -> MetadataResult<KeyBuilder<'_>> {
        let (entity, names) = (self.entity, owned_names(properties));
        let key = self.inner.configure(|b| b.primary_key(entity, &names, EXPLICIT))?;
        Ok(KeyBuilder { inner: &mut *self.inner, key })
    }

    /// Add an alternate key
    pub fn alternate_key(&mut self, properties: &[&str]) -> MetadataResult<KeyBuilder<'_>> {
        let (entity, names) = (self.entity, owned_names(properties));
        let key = self.inner.configure(|b| b.key(entity, &names, EXPLICIT))?;
        Ok(KeyBuilder { inner: &mut *self.inner, key })
    }

    /// Configure a property backed by a member or already in the model
    pub fn property(&mut self, name: &str) -> MetadataResult<PropertyBuilder<'_>> {
        let entity = self.entity;
        let property = self.inner.configure(|b| b.property(entity, name, None, EXPLICIT))?;
        Ok(PropertyBuilder::new(&mut *self.inner, property))
    }

    /// Configure a property of the given type, shadow when no member backs it
    pub fn shadow_property(
        &mut self,
        name: &str,
        value_type: ValueType,
    ) -> MetadataResult<PropertyBuilder<'_>> {
        let entity = self.entity;
        let property = self
            .inner
            .configure(|b| b.property(entity, name, Some(&value_type), EXPLICIT))?;
        Ok(PropertyBuilder::new(&mut *self.inner, property))
    }

    /// Exclude a member, removing whatever the model built from it
    pub fn ignore(&mut self, member: &str) -> MetadataResult<&mut Self> {
        let entity = self.entity;
        self.inner.configure(|b| b.ignore_member(entity, member, EXPLICIT))?;
        Ok(self)
    }

    pub fn index(&mut self, properties: &[&str]) -> MetadataResult<IndexBuilder<'_>> {
        let (entity, names) = (self.entity, owned_names(properties));
        let index = self.inner.configure(|b| b.index(entity, &names, EXPLICIT))?;
        Ok(IndexBuilder { inner: &mut *self.inner, index })
    }

    pub fn annotation(&mut self, name: &str, value: &str) -> MetadataResult<&mut Self> {
        let entity = self.entity;
        self.inner.configure(|b| {
            let described = b.model().entity_name(entity);
            set_annotation(b.model_mut().entity_type_mut(entity), described, name, value)
        })?;
        Ok(self)
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    /// Start a relationship where this entity type references one `target`
    ///
    /// `navigation` names the reference member on this entity type; `None`
    /// configures the relationship without one.
    pub fn has_one(
        &mut self,
        target: &str,
        navigation: Option<&str>,
    ) -> MetadataResult<ReferenceNavigationBuilder<'_>> {
        let declaring = self.entity;
        let (target, fk) = self.inner.configure(|b| {
            let target = b.entity(target, EXPLICIT)?;
            // the target needs its key before anything can reference it
            b.process_conventions()?;
            let request = RelationshipRequest::new(target, declaring)
                .with_navigation_to_principal(NavigationRequest::from_name(navigation));
            Ok((target, b.relationship(&request, EXPLICIT)?))
        })?;
        Ok(ReferenceNavigationBuilder::new(
            &mut *self.inner,
            fk,
            declaring,
            target,
            navigation.map(str::to_string),
        ))
    }

    /// Start a relationship where this entity type holds many `target`s
    pub fn has_many(
        &mut self,
        target: &str,
        navigation: Option<&str>,
    ) -> MetadataResult<CollectionNavigationBuilder<'_>> {
        let declaring = self.entity;
        let (target, fk) = self.inner.configure(|b| {
            let target = b.entity(target, EXPLICIT)?;
            b.process_conventions()?;
            let request = RelationshipRequest::new(declaring, target)
                .with_navigation_to_dependent(NavigationRequest::from_name(navigation))
                .unique(false);
            Ok((target, b.relationship(&request, EXPLICIT)?))
        })?;
        Ok(CollectionNavigationBuilder::new(&mut *self.inner, fk, declaring, target))
    }
}

// ============================================================================
// KeyBuilder
// ============================================================================

pub struct KeyBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    key: KeyId,
}

impl KeyBuilder<'_> {
    pub fn id(&self) -> KeyId {
        self.key
    }

    pub fn annotation(&mut self, name: &str, value: &str) -> MetadataResult<&mut Self> {
        let key = self.key;
        self.inner.configure(|b| {
            let described = b.model().describe_key(key);
            set_annotation(b.model_mut().key_mut(key), described, name, value)
        })?;
        Ok(self)
    }
}

// ============================================================================
// IndexBuilder
// ============================================================================

pub struct IndexBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    index: IndexId,
}

impl IndexBuilder<'_> {
    pub fn id(&self) -> IndexId {
        self.index
    }

    pub fn unique(&mut self, unique: bool) -> MetadataResult<&mut Self> {
        let index = self.index;
        self.inner.configure(|b| b.set_index_unique(index, unique, EXPLICIT))?;
        Ok(self)
    }

    pub fn annotation(&mut self, name: &str, value: &str) -> MetadataResult<&mut Self> {
        let index = self.index;
        self.inner.configure(|b| {
            let described = b.describe_index(index);
            set_annotation(b.model_mut().index_mut(index), described, name, value)
        })?;
        Ok(self)
    }
}
