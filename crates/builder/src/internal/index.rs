//! Index resolution

use super::InternalModelBuilder;
use crate::events::ModelEvent;
use modelforge_core::{ConfigurationSource, MetadataError, MetadataResult};
use modelforge_metadata::{EntityTypeId, IndexId, PropertyId};

impl InternalModelBuilder {
    /// Find or create an index over the named properties
    pub fn index(
        &mut self,
        entity: EntityTypeId,
        names: &[String],
        source: ConfigurationSource,
    ) -> MetadataResult<IndexId> {
        let properties = self.resolve_properties(entity, names, source)?;
        self.index_for_properties(entity, properties, source)
    }

    pub fn index_for_properties(
        &mut self,
        entity: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> MetadataResult<IndexId> {
        if let Some(existing) = self.model().find_index(entity, &properties).map(|i| i.id()) {
            if let Some(index) = self.model_mut().index_mut(existing) {
                index.upgrade_source(source);
            }
            return Ok(existing);
        }
        let id = self.model_mut().add_index(entity, properties, source)?;
        self.notify(ModelEvent::IndexAdded(id));
        Ok(id)
    }

    pub fn set_index_unique(
        &mut self,
        id: IndexId,
        unique: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let index = self
            .model_mut()
            .index_mut(id)
            .ok_or_else(|| MetadataError::internal(format!("index {id} not found")))?;
        if index.set_unique(unique, source).is_rejected() {
            let element = self.describe_index(id);
            return Err(MetadataError::conflicting(
                element,
                "index uniqueness was configured by a stronger source",
            ));
        }
        Ok(())
    }

    pub fn remove_index(&mut self, id: IndexId, source: ConfigurationSource) -> MetadataResult<()> {
        let index = self
            .model()
            .index(id)
            .ok_or_else(|| MetadataError::internal(format!("index {id} not found")))?;
        if index.configuration_source() > source {
            return Err(MetadataError::conflicting(
                self.describe_index(id),
                format!("index was configured at {}", index.configuration_source().display_name()),
            ));
        }
        self.model_mut().remove_index(id)?;
        Ok(())
    }

    /// `Entity(Props)` for an index
    pub(crate) fn describe_index(&self, id: IndexId) -> String {
        match self.model().index(id) {
            Some(index) => format!(
                "{}({})",
                self.model().entity_name(index.entity()),
                self.model().property_names(index.properties())
            ),
            None => id.to_string(),
        }
    }
}
