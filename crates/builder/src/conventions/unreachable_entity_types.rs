use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::{ConfigurationSource, MetadataResult};
use modelforge_metadata::EntityTypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Removes entity types that were only added by convention and are no
/// longer reachable from a configured entity type
pub struct UnreachableEntityTypeConvention;

impl Convention for UnreachableEntityTypeConvention {
    fn name(&self) -> &'static str {
        "unreachable_entity_types"
    }

    fn description(&self) -> &'static str {
        "Remove convention entity types no navigation leads to"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::ForeignKeyRemoved { .. }
            | ModelEvent::NavigationRemoved { .. }
            | ModelEvent::MemberIgnored { .. }
            | ModelEvent::EntityTypeRemoved { .. }
            | ModelEvent::EntityTypeIgnored { .. } => sweep(builder),
            _ => Ok(()),
        }
    }
}

/// Remove every unreachable convention entity type
pub(crate) fn sweep(builder: &mut InternalModelBuilder) -> MetadataResult<()> {
    let reachable = reachable_entity_types(builder);
    let unreachable: Vec<EntityTypeId> = builder
        .model()
        .entity_types()
        .filter(|e| e.configuration_source() == ConfigurationSource::Convention)
        .filter(|e| !reachable.contains(&e.id()))
        .map(|e| e.id())
        .collect();

    for id in unreachable {
        if builder.model().entity_type(id).is_none() {
            continue;
        }
        let name = builder.model().entity_name(id);
        if builder.attempt(|b| b.remove_entity_type(id))?.is_some() {
            debug!(entity = %name, "removed unreachable entity type");
        }
    }
    Ok(())
}

/// Entity types reachable from configured ones through navigations or
/// configured relationships
fn reachable_entity_types(builder: &InternalModelBuilder) -> HashSet<EntityTypeId> {
    let model = builder.model();
    let mut edges: HashMap<EntityTypeId, Vec<EntityTypeId>> = HashMap::new();
    for fk in model.foreign_keys() {
        let (dependent, principal) = (fk.dependent(), fk.principal());
        if fk.configuration_source() != ConfigurationSource::Convention {
            edges.entry(dependent).or_default().push(principal);
            edges.entry(principal).or_default().push(dependent);
            continue;
        }
        if fk.navigation_to_principal().is_some() {
            edges.entry(dependent).or_default().push(principal);
        }
        if fk.navigation_to_dependent().is_some() {
            edges.entry(principal).or_default().push(dependent);
        }
    }

    let mut queue: VecDeque<EntityTypeId> = model
        .entity_types()
        .filter(|e| e.configuration_source() > ConfigurationSource::Convention)
        .map(|e| e.id())
        .collect();
    let mut reachable: HashSet<EntityTypeId> = queue.iter().copied().collect();
    while let Some(entity) = queue.pop_front() {
        for other in edges.get(&entity).into_iter().flatten() {
            if reachable.insert(*other) {
                queue.push_back(*other);
            }
        }
    }
    reachable
}
