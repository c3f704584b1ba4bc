use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::MetadataResult;
use modelforge_metadata::{ForeignKeyId, PropertyId};
use tracing::debug;

/// Replaces shadow foreign key properties with real ones once they appear,
/// and flips one-to-one relationships toward the side that carries them
pub struct ForeignKeyPropertyDiscoveryConvention;

impl Convention for ForeignKeyPropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "foreign_key_property_discovery"
    }

    fn description(&self) -> &'static str {
        "Use properties named after a navigation or principal as foreign key properties"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::PropertyAdded(property) => property_added(builder, *property),
            ModelEvent::ForeignKeyAdded(fk) => settle(builder, *fk),
            ModelEvent::NavigationAdded(navigation) => {
                match builder.model().navigation(*navigation).map(|n| n.foreign_key()) {
                    Some(fk) => settle(builder, fk),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

fn property_added(builder: &mut InternalModelBuilder, property: PropertyId) -> MetadataResult<()> {
    let Some(entity) = builder.model().property(property).map(|p| p.entity()) else {
        return Ok(());
    };
    let owned: Vec<ForeignKeyId> = builder.model().foreign_keys_of(entity).map(|fk| fk.id()).collect();
    for fk in owned {
        rediscover(builder, fk)?;
    }

    // A property on the principal side may mean the one-to-one runs the other way
    let referencing: Vec<ForeignKeyId> = builder
        .model()
        .referencing_foreign_keys(entity)
        .into_iter()
        .filter(|fk| builder.model().foreign_key(*fk).is_some_and(|f| f.is_unique()))
        .collect();
    for fk in referencing {
        if builder.model().foreign_key(fk).is_some() {
            builder.attempt(|b| b.reorient_one_to_one(fk))?;
        }
    }
    Ok(())
}

fn settle(builder: &mut InternalModelBuilder, fk: ForeignKeyId) -> MetadataResult<()> {
    let replaced = builder.attempt(|b| b.reorient_one_to_one(fk))?.flatten();
    let current = replaced.unwrap_or(fk);
    if builder.model().foreign_key(current).is_some() {
        rediscover(builder, current)?;
    }
    Ok(())
}

fn rediscover(builder: &mut InternalModelBuilder, fk: ForeignKeyId) -> MetadataResult<()> {
    if builder.model().foreign_key(fk).is_none() {
        return Ok(());
    }
    if let Some(true) = builder.attempt(|b| b.rediscover_foreign_key_properties(fk))? {
        debug!(
            foreign_key = %builder.model().describe_foreign_key(fk),
            "foreign key properties discovered"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{builder_with, registry};
    use crate::internal::RelationshipRequest;
    use modelforge_core::{ConfigurationSource, TypeDescriptor, TypeRegistry, ValueType};

    #[test]
    fn test_foreign_key_property_matched_by_principal_name() {
        let mut builder = builder_with(registry());
        let customer = builder
            .configure(|b| b.entity("Customer", ConfigurationSource::Explicit))
            .unwrap();
        let order = builder
            .configure(|b| b.entity("Order", ConfigurationSource::Explicit))
            .unwrap();
        let fk = builder
            .configure(|b| b.relationship(&RelationshipRequest::new(customer, order), ConfigurationSource::Explicit))
            .unwrap();

        let model = builder.model();
        let foreign_key = model.foreign_key(fk).unwrap();
        assert_eq!(model.property_names(foreign_key.properties()), "CustomerId");
        assert!(!model.property(foreign_key.properties()[0]).unwrap().is_shadow());
    }

    #[test]
    fn test_one_to_one_flips_toward_matching_property() {
        let registry = TypeRegistry::new()
            .with_type(
                TypeDescriptor::new("Person")
                    .scalar("Id", ValueType::Int32)
                    .reference("Passport", "Passport"),
            )
            .with_type(
                TypeDescriptor::new("Passport")
                    .scalar("Id", ValueType::Int32)
                    .reference("Person", "Person"),
            );
        let mut builder = builder_with(registry);
        let person = builder
            .configure(|b| b.entity("Person", ConfigurationSource::Explicit))
            .unwrap();
        let passport = builder.model().find_entity_type("Passport").unwrap().id();
        assert!(builder.model().foreign_keys_of(passport).next().is_some());

        builder
            .configure(|b| {
                b.property(person, "PassportId", Some(&ValueType::Int32), ConfigurationSource::Explicit)
            })
            .unwrap();

        let model = builder.model();
        let fks: Vec<_> = model.foreign_keys().collect();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].dependent(), person);
        assert_eq!(fks[0].principal(), passport);
        assert_eq!(model.property_names(fks[0].properties()), "PassportId");
        assert!(model.find_property(passport, "PersonId").is_none());
        assert_eq!(model.find_navigation(person, "Passport").unwrap().foreign_key(), fks[0].id());
        assert_eq!(model.find_navigation(passport, "Person").unwrap().foreign_key(), fks[0].id());
    }
}
