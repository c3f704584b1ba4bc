//! Relationship configuration chains
//!
//! `has_one`/`has_many` on an entity builder start a chain; `with_one` or
//! `with_many` fixes the other side. Every step re-resolves the request
//! against the foreign key the previous step returned, which may be a new
//! one when the relationship had to be recreated.

use super::entity::owned_names;
use super::{set_annotation, EXPLICIT};
use crate::internal::{InternalModelBuilder, NavigationRequest, RelationshipRequest};
use modelforge_core::{MetadataError, MetadataResult};
use modelforge_metadata::{EntityTypeId, ForeignKey, ForeignKeyId};

fn resolve(
    inner: &mut InternalModelBuilder,
    request: &RelationshipRequest,
) -> MetadataResult<ForeignKeyId> {
    inner.configure(|b| b.relationship(request, EXPLICIT))
}

fn ends_of(inner: &InternalModelBuilder, fk: ForeignKeyId) -> MetadataResult<(EntityTypeId, EntityTypeId)> {
    let foreign_key = inner.require_foreign_key(fk)?;
    Ok((foreign_key.principal(), foreign_key.dependent()))
}

fn annotate(
    inner: &mut InternalModelBuilder,
    fk: ForeignKeyId,
    name: &str,
    value: &str,
) -> MetadataResult<()> {
    inner.configure(|b| {
        let described = b.model().describe_foreign_key(fk);
        set_annotation(b.model_mut().foreign_key_mut(fk), described, name, value)
    })
}

// ============================================================================
// Navigation builders
// ============================================================================

/// Relationship started from a reference navigation
pub struct ReferenceNavigationBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    fk: ForeignKeyId,
    declaring: EntityTypeId,
    target: EntityTypeId,
    navigation: Option<String>,
}

impl<'a> ReferenceNavigationBuilder<'a> {
    pub(crate) fn new(
        inner: &'a mut InternalModelBuilder,
        fk: ForeignKeyId,
        declaring: EntityTypeId,
        target: EntityTypeId,
        navigation: Option<String>,
    ) -> Self {
        Self { inner, fk, declaring, target, navigation }
    }

    /// The target holds many of the declaring entity type
    pub fn with_many(self, inverse: Option<&str>) -> MetadataResult<RelationshipBuilder<'a>> {
        let request = RelationshipRequest::new(self.target, self.declaring)
            .with_navigation_to_principal(NavigationRequest::from_name(self.navigation))
            .with_navigation_to_dependent(NavigationRequest::from_name(inverse))
            .unique(false)
            .with_principal_end()
            .for_existing(self.fk);
        let fk = resolve(self.inner, &request)?;
        Ok(RelationshipBuilder { inner: self.inner, fk })
    }

    /// The target holds one of the declaring entity type
    ///
    /// Which side is the dependent stays open until `foreign_key` or
    /// `referenced_key` names it.
    pub fn with_one(self, inverse: Option<&str>) -> MetadataResult<OneToOneBuilder<'a>> {
        let request = RelationshipRequest::new(self.target, self.declaring)
            .with_navigation_to_principal(NavigationRequest::from_name(self.navigation.clone()))
            .with_navigation_to_dependent(NavigationRequest::from_name(inverse))
            .unique(true)
            .for_existing(self.fk);
        let fk = resolve(self.inner, &request)?;
        Ok(OneToOneBuilder {
            inner: self.inner,
            fk,
            declaring: self.declaring,
            target: self.target,
            declaring_navigation: self.navigation,
            target_navigation: inverse.map(str::to_string),
        })
    }
}

/// Relationship started from a collection navigation
pub struct CollectionNavigationBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    fk: ForeignKeyId,
    declaring: EntityTypeId,
    target: EntityTypeId,
}

impl<'a> CollectionNavigationBuilder<'a> {
    pub(crate) fn new(
        inner: &'a mut InternalModelBuilder,
        fk: ForeignKeyId,
        declaring: EntityTypeId,
        target: EntityTypeId,
    ) -> Self {
        Self { inner, fk, declaring, target }
    }

    /// Each target belongs to one of the declaring entity type
    pub fn with_one(self, inverse: Option<&str>) -> MetadataResult<RelationshipBuilder<'a>> {
        let request = RelationshipRequest::new(self.declaring, self.target)
            .with_navigation_to_principal(NavigationRequest::from_name(inverse))
            .unique(false)
            .with_principal_end()
            .for_existing(self.fk);
        let fk = resolve(self.inner, &request)?;
        Ok(RelationshipBuilder { inner: self.inner, fk })
    }
}

// ============================================================================
// RelationshipBuilder
// ============================================================================

/// One-to-many relationship with both ends fixed
pub struct RelationshipBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    fk: ForeignKeyId,
}

impl RelationshipBuilder<'_> {
    pub fn id(&self) -> ForeignKeyId {
        self.fk
    }

    pub fn metadata(&self) -> Option<&ForeignKey> {
        self.inner.model().foreign_key(self.fk)
    }

    /// Use these dependent properties as the foreign key
    pub fn foreign_key(&mut self, properties: &[&str]) -> MetadataResult<&mut Self> {
        let (principal, dependent) = ends_of(self.inner, self.fk)?;
        let request = RelationshipRequest::new(principal, dependent)
            .with_foreign_key(owned_names(properties))
            .with_principal_end()
            .for_existing(self.fk);
        self.fk = resolve(self.inner, &request)?;
        Ok(self)
    }

    /// Reference these principal properties instead of the primary key
    pub fn referenced_key(&mut self, properties: &[&str]) -> MetadataResult<&mut Self> {
        let (principal, dependent) = ends_of(self.inner, self.fk)?;
        let request = RelationshipRequest::new(principal, dependent)
            .with_principal_key(owned_names(properties))
            .with_principal_end()
            .for_existing(self.fk);
        self.fk = resolve(self.inner, &request)?;
        Ok(self)
    }

    pub fn required(&mut self, required: bool) -> MetadataResult<&mut Self> {
        let fk = self.fk;
        self.inner
            .configure(|b| b.set_relationship_required(fk, required, EXPLICIT))?;
        Ok(self)
    }

    pub fn annotation(&mut self, name: &str, value: &str) -> MetadataResult<&mut Self> {
        annotate(self.inner, self.fk, name, value)?;
        Ok(self)
    }
}

// ============================================================================
// OneToOneBuilder
// ============================================================================

/// One-to-one relationship whose dependent end may still be open
pub struct OneToOneBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    fk: ForeignKeyId,
    declaring: EntityTypeId,
    target: EntityTypeId,
    declaring_navigation: Option<String>,
    target_navigation: Option<String>,
}

impl OneToOneBuilder<'_> {
    pub fn id(&self) -> ForeignKeyId {
        self.fk
    }

    pub fn metadata(&self) -> Option<&ForeignKey> {
        self.inner.model().foreign_key(self.fk)
    }

    /// Make `dependent` the dependent end, with these foreign key properties
    pub fn foreign_key(&mut self, dependent: &str, properties: &[&str]) -> MetadataResult<&mut Self> {
        let (dependent, principal) = self.ends(dependent)?;
        let request = self
            .oriented_request(principal, dependent)
            .with_foreign_key(owned_names(properties));
        self.fk = resolve(self.inner, &request)?;
        Ok(self)
    }

    /// Make `principal` the principal end, referencing these properties
    pub fn referenced_key(&mut self, principal: &str, properties: &[&str]) -> MetadataResult<&mut Self> {
        let (principal, dependent) = self.ends(principal)?;
        let request = self
            .oriented_request(principal, dependent)
            .with_principal_key(owned_names(properties));
        self.fk = resolve(self.inner, &request)?;
        Ok(self)
    }

    pub fn required(&mut self, required: bool) -> MetadataResult<&mut Self> {
        let fk = self.fk;
        self.inner
            .configure(|b| b.set_relationship_required(fk, required, EXPLICIT))?;
        Ok(self)
    }

    pub fn annotation(&mut self, name: &str, value: &str) -> MetadataResult<&mut Self> {
        annotate(self.inner, self.fk, name, value)?;
        Ok(self)
    }

    /// The named end first, then the other one
    fn ends(&self, name: &str) -> MetadataResult<(EntityTypeId, EntityTypeId)> {
        let named = self
            .inner
            .model()
            .find_entity_type(name)
            .map(|e| e.id())
            .ok_or_else(|| MetadataError::EntityTypeNotFound(name.to_string()))?;
        if named == self.declaring {
            Ok((self.declaring, self.target))
        } else if named == self.target {
            Ok((self.target, self.declaring))
        } else {
            Err(MetadataError::InvalidConfig(format!(
                "'{name}' is not an end of {}",
                self.inner.model().describe_foreign_key(self.fk)
            )))
        }
    }

    fn oriented_request(&self, principal: EntityTypeId, dependent: EntityTypeId) -> RelationshipRequest {
        let (to_principal, to_dependent) = if dependent == self.declaring {
            (&self.declaring_navigation, &self.target_navigation)
        } else {
            (&self.target_navigation, &self.declaring_navigation)
        };
        RelationshipRequest::new(principal, dependent)
            .with_navigation_to_principal(NavigationRequest::from_name(to_principal.clone()))
            .with_navigation_to_dependent(NavigationRequest::from_name(to_dependent.clone()))
            .unique(true)
            .with_principal_end()
            .for_existing(self.fk)
    }
}
