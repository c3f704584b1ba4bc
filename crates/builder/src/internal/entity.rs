//! Entity type and member-ignore resolution

use super::{blocked_by_ignore, InternalModelBuilder};
use crate::events::ModelEvent;
use modelforge_core::{ConfigurationSource, MetadataError, MetadataResult};
use modelforge_metadata::{EntityTypeId, ForeignKeyId, PropertyId};
use tracing::debug;

impl InternalModelBuilder {
    // ========================================================================
    // Entity types
    // ========================================================================

    /// Find or create an entity type
    ///
    /// The backing type is the registered type of the same name, if any;
    /// otherwise the entity type is shadow. An ignore at an equal or stronger
    /// source blocks the call, a weaker one is lifted.
    pub fn entity(&mut self, name: &str, source: ConfigurationSource) -> MetadataResult<EntityTypeId> {
        let ignored = self.model().ignored_entity_type_source(name);
        if blocked_by_ignore(ignored, source) {
            return Err(MetadataError::IgnoredEntityType(name.to_string()));
        }
        if ignored.is_some() {
            self.model_mut().unignore_entity_type(name, source);
        }

        if let Some(existing) = self.model().find_entity_type(name).map(|e| e.id()) {
            if let Some(entity) = self.model_mut().entity_type_mut(existing) {
                entity.upgrade_source(source);
            }
            return Ok(existing);
        }

        let clr_type = self.accessor().has_type(name).then(|| name.to_string());
        let id = self.model_mut().add_entity_type(name, clr_type, source)?;
        self.notify(ModelEvent::EntityTypeAdded(id));
        Ok(id)
    }

    /// Exclude an entity type, removing it if present
    pub fn ignore_entity(&mut self, name: &str, source: ConfigurationSource) -> MetadataResult<()> {
        if let Some(entity) = self.model().find_entity_type(name) {
            if entity.configuration_source() > source {
                return Err(MetadataError::conflicting(
                    name,
                    format!(
                        "entity type was added at {}",
                        entity.configuration_source().display_name()
                    ),
                ));
            }
            let id = entity.id();
            self.remove_entity_type(id)?;
        }
        self.model_mut().ignore_entity_type(name, source);
        debug!(entity = name, %source, "ignored entity type");
        self.notify(ModelEvent::EntityTypeIgnored {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Lift an entity type ignore; returns `false` when a stronger source keeps it
    pub fn unignore_entity(&mut self, name: &str, source: ConfigurationSource) -> bool {
        self.model_mut().unignore_entity_type(name, source)
    }

    pub fn rename_entity(&mut self, id: EntityTypeId, new_name: &str) -> MetadataResult<()> {
        self.model_mut().rename_entity_type(id, new_name)
    }

    /// Remove an entity type and every relationship touching it
    ///
    /// Relationships go through `remove_relationship` so shadow foreign key
    /// properties they leave behind on other entity types are cleaned up.
    pub fn remove_entity_type(&mut self, id: EntityTypeId) -> MetadataResult<()> {
        let touching: Vec<ForeignKeyId> = self
            .model()
            .foreign_keys()
            .filter(|fk| fk.dependent() == id || fk.principal() == id)
            .map(|fk| fk.id())
            .collect();
        for fk in touching {
            if self.model().foreign_key(fk).is_some() {
                self.remove_relationship(fk)?;
            }
        }
        let removed = self.model_mut().remove_entity_type(id)?;
        self.notify(ModelEvent::EntityTypeRemoved {
            name: removed.name().to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Exclude a member, removing the property or navigation of that name
    pub fn ignore_member(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let entity_name = self.model().require_entity(entity)?.name().to_string();

        let property = self
            .model()
            .find_property(entity, name)
            .map(|p| (p.id(), p.configuration_source()));
        let navigation = self
            .model()
            .find_navigation(entity, name)
            .map(|n| (n.id(), n.foreign_key(), n.configuration_source()));

        let mut foreign_key = None;
        if let Some((id, existing)) = property {
            check_member_source(&entity_name, name, existing, source)?;
            self.remove_property_cascade(id, source)?;
        } else if let Some((id, fk, existing)) = navigation {
            check_member_source(&entity_name, name, existing, source)?;
            self.remove_navigation(id)?;
            foreign_key = Some(fk);
        }

        if let Some(entity_type) = self.model_mut().entity_type_mut(entity) {
            entity_type.ignore_member(name, source);
        }
        debug!(entity = %entity_name, member = name, %source, "ignored member");
        self.notify(ModelEvent::MemberIgnored {
            entity,
            name: name.to_string(),
            foreign_key,
        });
        Ok(())
    }

    /// Lift a member ignore; returns `false` when a stronger source keeps it
    pub fn unignore_member(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> MetadataResult<bool> {
        let entity_type = self
            .model_mut()
            .entity_type_mut(entity)
            .ok_or_else(|| MetadataError::EntityTypeNotFound(entity.to_string()))?;
        Ok(entity_type.unignore_member(name, source))
    }

    /// Check the ignore list before adding a member
    ///
    /// A weaker ignore is lifted so the member can be added.
    pub(crate) fn check_member_not_ignored(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let entity_type = self.model().require_entity(entity)?;
        let ignored = entity_type.ignored_member_source(name);
        if blocked_by_ignore(ignored, source) {
            return Err(MetadataError::IgnoredMember {
                entity: entity_type.name().to_string(),
                member: name.to_string(),
            });
        }
        if ignored.is_some() {
            if let Some(entity_type) = self.model_mut().entity_type_mut(entity) {
                entity_type.unignore_member(name, source);
            }
        }
        Ok(())
    }

    /// Resolve a list of member names to properties, creating them from the
    /// backing type where needed
    pub(crate) fn resolve_properties(
        &mut self,
        entity: EntityTypeId,
        names: &[String],
        source: ConfigurationSource,
    ) -> MetadataResult<Vec<PropertyId>> {
        names
            .iter()
            .map(|name| self.property(entity, name, None, source))
            .collect()
    }
}

fn check_member_source(
    entity: &str,
    member: &str,
    existing: ConfigurationSource,
    source: ConfigurationSource,
) -> MetadataResult<()> {
    if existing > source {
        return Err(MetadataError::conflicting(
            format!("{entity}.{member}"),
            format!("member was configured at {}", existing.display_name()),
        ));
    }
    Ok(())
}
