//! Property resolution and facets

use super::InternalModelBuilder;
use crate::events::ModelEvent;
use modelforge_core::{
    ConfigurationSource, MemberKind, MetadataError, MetadataResult, SetOutcome, TriState, ValueType,
};
use modelforge_metadata::{EntityTypeId, Property, PropertyId};

/// Map a rejected facet change to a conflict naming the property
fn check_outcome(outcome: SetOutcome, element: String, facet: &str) -> MetadataResult<SetOutcome> {
    if outcome.is_rejected() {
        return Err(MetadataError::conflicting(
            element,
            format!("{facet} was configured by a stronger source"),
        ));
    }
    Ok(outcome)
}

impl InternalModelBuilder {
    // ========================================================================
    // Properties
    // ========================================================================

    /// Find or create a property
    ///
    /// A backing member supplies the type; with no backing member the given
    /// type creates a shadow property. With neither, the property cannot be
    /// resolved.
    pub fn property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        value_type: Option<&ValueType>,
        source: ConfigurationSource,
    ) -> MetadataResult<PropertyId> {
        let entity_type = self.model().require_entity(entity)?;
        let entity_name = entity_type.name().to_string();
        let clr_type = entity_type.clr_type().map(str::to_string);

        if let Some(existing) = self.model().find_property(entity, name) {
            let id = existing.id();
            if let Some(value_type) = value_type {
                if value_type != existing.value_type() {
                    self.set_property_type(id, value_type.clone(), source)?;
                }
            }
            if let Some(property) = self.model_mut().property_mut(id) {
                property.upgrade_source(source);
            }
            return Ok(id);
        }

        self.check_member_not_ignored(entity, name, source)?;

        let member = clr_type
            .as_deref()
            .and_then(|t| self.accessor().find_member(t, name));
        let (resolved, is_shadow) = match member.map(|m| m.kind) {
            Some(MemberKind::Scalar(member_type)) => {
                if value_type.is_some_and(|v| *v != member_type) {
                    return Err(MetadataError::conflicting(
                        format!("{entity_name}.{name}"),
                        format!("the backing member has type '{member_type}'"),
                    ));
                }
                (member_type, false)
            }
            Some(_) => {
                return Err(MetadataError::navigation_collision(
                    entity_name,
                    name,
                    "the backing member is a navigation",
                ));
            }
            None => match value_type {
                Some(value_type) => (value_type.clone(), true),
                None => {
                    return Err(MetadataError::PropertyNotFound {
                        entity: entity_name,
                        property: name.to_string(),
                    });
                }
            },
        };

        let id = self
            .model_mut()
            .add_property(entity, name, resolved, is_shadow, source)?;
        self.notify(ModelEvent::PropertyAdded(id));
        Ok(id)
    }

    /// Remove a property and everything built on it
    ///
    /// Keys, foreign keys and indexes over the property go first.
    pub fn remove_property_cascade(
        &mut self,
        id: PropertyId,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let property = self.require_property(id)?;
        if property.configuration_source() > source {
            return Err(MetadataError::conflicting(
                self.property_element(id),
                format!(
                    "property was configured at {}",
                    property.configuration_source().display_name()
                ),
            ));
        }
        let entity = property.entity();

        for fk in self.model().foreign_keys_containing(id) {
            if self.model().foreign_key(fk).is_some() {
                self.remove_relationship(fk)?;
            }
        }
        for key in self.model().keys_containing(id) {
            if self.model().key(key).is_some() {
                self.remove_key(key, source)?;
            }
        }
        for index in self.model().indexes_containing(id) {
            self.model_mut().remove_index(index)?;
        }

        let removed = self.model_mut().remove_property(id)?;
        self.notify(ModelEvent::PropertyRemoved {
            entity,
            name: removed.name().to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // Type and nullability
    // ========================================================================

    /// Change the type of a shadow property
    pub fn set_property_type(
        &mut self,
        id: PropertyId,
        value_type: ValueType,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let property = self.require_property(id)?;
        if property.value_type() == &value_type {
            self.require_property_mut(id)?.set_value_type(value_type, source);
            return Ok(());
        }
        if !property.is_shadow() {
            return Err(MetadataError::conflicting(
                self.property_element(id),
                format!("the backing member has type '{}'", property.value_type()),
            ));
        }
        let was_nullable = property.is_nullable();
        let element = self.property_element(id);
        let property = self.require_property_mut(id)?;
        check_outcome(property.set_value_type(value_type, source), element, "the type")?;
        if property.is_nullable() != was_nullable {
            self.notify(ModelEvent::PropertyNullabilityChanged(id));
        }
        Ok(())
    }

    /// Make a property required or optional
    ///
    /// Shadow properties switch to the nullable or non-nullable counterpart
    /// of their type. A backing member of a non-nullable type cannot become
    /// optional.
    pub fn set_property_required(
        &mut self,
        id: PropertyId,
        required: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let property = self.require_property(id)?;
        let element = self.property_element(id);

        if !required {
            if !self.model().keys_containing(id).is_empty() {
                return Err(MetadataError::conflicting(
                    element,
                    "key properties cannot be optional",
                ));
            }
            if !property.can_be_nullable() {
                if !property.is_shadow() {
                    return Err(MetadataError::NonNullableProperty {
                        entity: self.model().entity_name(property.entity()),
                        property: property.name().to_string(),
                        value_type: property.value_type().to_string(),
                    });
                }
                let nullable = property.value_type().to_nullable();
                self.set_property_type(id, nullable, source)?;
            }
        }

        let property = self.require_property(id)?;
        if required && property.is_shadow() && matches!(property.value_type(), ValueType::Optional(_)) {
            let non_nullable = property.value_type().to_non_nullable();
            self.set_property_type(id, non_nullable, source)?;
        }

        let property = self.require_property_mut(id)?;
        let outcome = check_outcome(property.set_nullable(!required, source), element, "nullability")?;
        if outcome.is_updated() {
            self.notify(ModelEvent::PropertyNullabilityChanged(id));
        }
        Ok(())
    }

    // ========================================================================
    // Facets
    // ========================================================================

    pub fn set_concurrency_token(
        &mut self,
        id: PropertyId,
        value: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        self.set_facet(id, "the concurrency token flag", |p| {
            p.set_concurrency_token(value, source)
        })
    }

    pub fn set_generate_value_on_add(
        &mut self,
        id: PropertyId,
        value: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        self.set_facet(id, "value generation", |p| {
            p.set_generate_value_on_add(value, source)
        })
    }

    pub fn set_store_computed(
        &mut self,
        id: PropertyId,
        value: TriState,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        self.set_facet(id, "the store computed flag", |p| {
            p.set_store_computed(value, source)
        })
    }

    pub fn set_use_store_default(
        &mut self,
        id: PropertyId,
        value: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        self.set_facet(id, "the store default flag", |p| {
            p.set_use_store_default(value, source)
        })
    }

    pub fn set_max_length(
        &mut self,
        id: PropertyId,
        value: Option<usize>,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        self.set_facet(id, "the maximum length", |p| p.set_max_length(value, source))
    }

    fn set_facet(
        &mut self,
        id: PropertyId,
        facet: &str,
        set: impl FnOnce(&mut Property) -> SetOutcome,
    ) -> MetadataResult<()> {
        let element = self.property_element(id);
        let outcome = set(self.require_property_mut(id)?);
        check_outcome(outcome, element, facet).map(|_| ())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn require_property(&self, id: PropertyId) -> MetadataResult<&Property> {
        self.model()
            .property(id)
            .ok_or_else(|| MetadataError::PropertyNotFound {
                entity: "?".to_string(),
                property: id.to_string(),
            })
    }

    fn require_property_mut(&mut self, id: PropertyId) -> MetadataResult<&mut Property> {
        self.model_mut()
            .property_mut(id)
            .ok_or_else(|| MetadataError::PropertyNotFound {
                entity: "?".to_string(),
                property: id.to_string(),
            })
    }

    /// `Entity.Property` for error messages
    pub(crate) fn property_element(&self, id: PropertyId) -> String {
        match self.model().property(id) {
            Some(p) => format!("{}.{}", self.model().entity_name(p.entity()), p.name()),
            None => id.to_string(),
        }
    }
}
