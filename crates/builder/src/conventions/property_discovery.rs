use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::{ConfigurationSource, MemberAttribute, MemberKind, MetadataResult};
use modelforge_metadata::EntityTypeId;

/// Adds a property for every scalar member of the backing type
///
/// Members marked not-mapped are ignored at data annotation strength instead.
pub struct PropertyDiscoveryConvention;

impl Convention for PropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "property_discovery"
    }

    fn description(&self) -> &'static str {
        "Add a property for every scalar member of the backing type"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::EntityTypeAdded(entity) => discover_properties(builder, *entity),
            _ => Ok(()),
        }
    }
}

fn discover_properties(builder: &mut InternalModelBuilder, entity: EntityTypeId) -> MetadataResult<()> {
    let Some(clr_type) = builder
        .model()
        .entity_type(entity)
        .and_then(|e| e.clr_type())
        .map(str::to_string)
    else {
        return Ok(());
    };
    let Some(members) = builder.accessor().members(&clr_type) else {
        return Ok(());
    };

    for member in members.iter() {
        if member.has_attribute(&MemberAttribute::NotMapped) {
            builder.attempt(|b| {
                b.ignore_member(entity, &member.name, ConfigurationSource::DataAnnotation)
            })?;
            continue;
        }
        if let MemberKind::Scalar(_) = member.kind {
            builder.attempt(|b| b.property(entity, &member.name, None, ConfigurationSource::Convention))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{builder_with, registry};
    use modelforge_core::{ConfigurationSource, MemberAttribute, MemberInfo, TypeDescriptor, ValueType};

    #[test]
    fn test_scalar_members_become_properties() {
        let mut builder = builder_with(registry());
        let customer = builder
            .configure(|b| b.entity("Customer", ConfigurationSource::Explicit))
            .unwrap();
        let names: Vec<&str> = builder
            .model()
            .properties_of(customer)
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["Id", "Name"]);
        assert!(builder.model().properties_of(customer).all(|p| !p.is_shadow()));
    }

    #[test]
    fn test_not_mapped_member_is_ignored() {
        let registry = registry().with_type(
            TypeDescriptor::new("Draft")
                .scalar("Id", ValueType::Int32)
                .with_member(
                    MemberInfo::scalar("Cache", ValueType::String)
                        .with_attribute(MemberAttribute::NotMapped),
                ),
        );
        let mut builder = builder_with(registry);
        let draft = builder
            .configure(|b| b.entity("Draft", ConfigurationSource::Explicit))
            .unwrap();
        assert!(builder.model().find_property(draft, "Cache").is_none());
        assert_eq!(
            builder.model().entity_type(draft).unwrap().ignored_member_source("Cache"),
            Some(ConfigurationSource::DataAnnotation)
        );
    }
}
