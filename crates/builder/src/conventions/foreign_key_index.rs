use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::{ConfigurationSource, MetadataResult};
use modelforge_metadata::{EntityTypeId, IndexId, PropertyId};

const SOURCE: ConfigurationSource = ConfigurationSource::Convention;

/// Keeps one index per foreign key property list, unique when the
/// relationship is one-to-one
///
/// Property lists already covered by a key get no index.
pub struct ForeignKeyIndexConvention;

impl Convention for ForeignKeyIndexConvention {
    fn name(&self) -> &'static str {
        "foreign_key_index"
    }

    fn description(&self) -> &'static str {
        "Index foreign key properties"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        let entity = match event {
            ModelEvent::ForeignKeyAdded(fk)
            | ModelEvent::ForeignKeyPropertiesChanged(fk)
            | ModelEvent::ForeignKeyUniquenessChanged(fk) => {
                builder.model().foreign_key(*fk).map(|fk| fk.dependent())
            }
            ModelEvent::ForeignKeyRemoved { dependent, .. } => Some(*dependent),
            ModelEvent::KeyAdded(key) => builder.model().key(*key).map(|k| k.entity()),
            ModelEvent::KeyRemoved { entity } => Some(*entity),
            _ => None,
        };
        match entity {
            Some(entity) => sync_indexes(builder, entity),
            None => Ok(()),
        }
    }
}

fn sync_indexes(builder: &mut InternalModelBuilder, entity: EntityTypeId) -> MetadataResult<()> {
    let model = builder.model();
    if model.entity_type(entity).is_none() {
        return Ok(());
    }

    let mut desired: Vec<(Vec<PropertyId>, bool)> = Vec::new();
    for fk in model.foreign_keys_of(entity) {
        if model.find_key(entity, fk.properties()).is_some() {
            continue;
        }
        match desired.iter_mut().find(|(properties, _)| properties == fk.properties()) {
            Some((_, unique)) => *unique |= fk.is_unique(),
            None => desired.push((fk.properties().to_vec(), fk.is_unique())),
        }
    }
    let stale: Vec<IndexId> = model
        .indexes_of(entity)
        .filter(|i| i.configuration_source() == SOURCE)
        .filter(|i| !desired.iter().any(|(properties, _)| properties == i.properties()))
        .map(|i| i.id())
        .collect();

    for id in stale {
        builder.attempt(|b| b.remove_index(id, SOURCE))?;
    }
    for (properties, unique) in desired {
        let existing = builder.model().find_index(entity, &properties).map(|i| (i.id(), i.is_unique()));
        let index = match existing {
            Some((_, current)) if current == unique => continue,
            Some((id, _)) => id,
            None => match builder.attempt(|b| b.index_for_properties(entity, properties, SOURCE))? {
                Some(id) => id,
                None => continue,
            },
        };
        if builder.model().index(index).is_some_and(|i| i.is_unique() != unique) {
            builder.attempt(|b| b.set_index_unique(index, unique, SOURCE))?;
        }
    }
    Ok(())
}
