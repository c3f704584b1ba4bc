//! Key and primary key resolution

use super::InternalModelBuilder;
use crate::events::ModelEvent;
use modelforge_core::{ConfigurationSource, MetadataError, MetadataResult};
use modelforge_metadata::{EntityTypeId, ForeignKeyId, KeyId, PropertyId};
use tracing::debug;

impl InternalModelBuilder {
    /// Find or create a key over the named properties
    pub fn key(
        &mut self,
        entity: EntityTypeId,
        names: &[String],
        source: ConfigurationSource,
    ) -> MetadataResult<KeyId> {
        let properties = self.resolve_properties(entity, names, source)?;
        self.key_for_properties(entity, properties, source)
    }

    /// Find or create a key over exactly these properties, in this order
    pub fn key_for_properties(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> MetadataResult<KeyId> {
        if let Some(existing) = self.model().find_key(entity, &properties).map(|k| k.id()) {
            if let Some(key) = self.model_mut().key_mut(existing) {
                key.upgrade_source(source);
            }
            return Ok(existing);
        }
        let nullable: Vec<PropertyId> = properties
            .iter()
            .copied()
            .filter(|p| self.model().property(*p).is_some_and(|p| p.is_nullable()))
            .collect();
        let id = self.model_mut().add_key(entity, properties, source)?;
        for property in nullable {
            self.notify(ModelEvent::PropertyNullabilityChanged(property));
        }
        self.notify(ModelEvent::KeyAdded(id));
        Ok(id)
    }

    /// Find or create a key over the named properties and make it primary
    pub fn primary_key(
        &mut self,
        entity: EntityTypeId,
        names: &[String],
        source: ConfigurationSource,
    ) -> MetadataResult<KeyId> {
        let key = self.key(entity, names, source)?;
        self.promote_to_primary_key(entity, key, source)?;
        Ok(key)
    }

    /// Make `key` the primary key of `entity`
    ///
    /// The previous primary key survives as an alternate key when a stronger
    /// source added it or a foreign key references it; otherwise it is removed.
    pub fn promote_to_primary_key(
        &mut self,
        entity: EntityTypeId,
        key: KeyId,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let entity_type = self.model().require_entity(entity)?;
        let previous = entity_type.primary_key();
        let previous_source = entity_type.primary_key_source();

        if previous == Some(key) {
            self.model_mut().set_primary_key(entity, Some(key), source)?;
            return Ok(());
        }
        if !ConfigurationSource::can_set(previous_source, source) {
            return Err(MetadataError::conflicting(
                self.model().describe_key(key),
                format!(
                    "the primary key of '{}' was configured at {}",
                    entity_type.name(),
                    previous_source.map(|s| s.display_name()).unwrap_or("?")
                ),
            ));
        }

        self.model_mut().set_primary_key(entity, Some(key), source)?;
        debug!(key = %self.model().describe_key(key), %source, "primary key set");

        if let Some(previous) = previous {
            let removable = self.model().key(previous).is_some_and(|k| {
                k.configuration_source() == ConfigurationSource::Convention
            }) && self.model().foreign_keys_referencing_key(previous).is_empty();
            if removable {
                self.remove_key(previous, source)?;
            }
        }
        self.notify(ModelEvent::PrimaryKeyChanged { entity, previous });
        Ok(())
    }

    /// Remove a key
    ///
    /// Foreign keys referencing it are removed too, unless one of them was
    /// configured at an equal or stronger source.
    pub fn remove_key(&mut self, id: KeyId, source: ConfigurationSource) -> MetadataResult<()> {
        let key = self.model().key(id).ok_or_else(|| MetadataError::KeyNotFound {
            entity: "?".to_string(),
            properties: id.to_string(),
        })?;
        let entity = key.entity();
        if key.configuration_source() > source {
            return Err(MetadataError::conflicting(
                self.model().describe_key(id),
                format!("key was configured at {}", key.configuration_source().display_name()),
            ));
        }

        let referencing: Vec<ForeignKeyId> = self.model().foreign_keys_referencing_key(id);
        if let Some(blocking) = referencing.iter().find(|fk| {
            self.model()
                .foreign_key(**fk)
                .is_some_and(|fk| fk.configuration_source() >= source)
        }) {
            return Err(MetadataError::KeyInUse {
                entity: self.model().entity_name(entity),
                key: self.model().describe_key(id),
                foreign_key: self.model().describe_foreign_key(*blocking),
            });
        }
        for fk in referencing {
            if self.model().foreign_key(fk).is_some() {
                self.remove_relationship(fk)?;
            }
        }

        let was_primary = self.model().is_primary_key(id);
        self.model_mut().remove_key(id)?;
        self.notify(ModelEvent::KeyRemoved { entity });
        if was_primary {
            self.notify(ModelEvent::PrimaryKeyChanged {
                entity,
                previous: Some(id),
            });
        }
        Ok(())
    }
}
