use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use crate::naming::{is_key_property_name, names_match};
use modelforge_core::{ConfigurationSource, MetadataResult};
use modelforge_metadata::EntityTypeId;
use tracing::debug;

/// Discovers primary keys named `Id` or `<Type>Id` and marks single-property
/// integer and guid keys as generated on add
pub struct KeyDiscoveryConvention;

impl Convention for KeyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "key_discovery"
    }

    fn description(&self) -> &'static str {
        "Make a property named Id or <Type>Id the primary key"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::EntityTypeAdded(entity)
            | ModelEvent::PropertyRemoved { entity, .. }
            | ModelEvent::KeyRemoved { entity } => discover_primary_key(builder, *entity),
            ModelEvent::PropertyAdded(property) => {
                match builder.model().property(*property).map(|p| p.entity()) {
                    Some(entity) => discover_primary_key(builder, entity),
                    None => Ok(()),
                }
            }
            ModelEvent::PrimaryKeyChanged { entity, .. }
            | ModelEvent::ForeignKeyRemoved { dependent: entity, .. } => {
                configure_value_generation(builder, *entity)
            }
            ModelEvent::ForeignKeyAdded(fk) | ModelEvent::ForeignKeyPropertiesChanged(fk) => {
                match builder.model().foreign_key(*fk).map(|fk| fk.dependent()) {
                    Some(entity) => configure_value_generation(builder, entity),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

fn discover_primary_key(builder: &mut InternalModelBuilder, entity: EntityTypeId) -> MetadataResult<()> {
    let Some(entity_type) = builder.model().entity_type(entity) else {
        return Ok(());
    };
    if entity_type.primary_key().is_some() {
        return Ok(());
    }
    let short_name = entity_type.short_name().to_string();
    let suffix = builder.config().key_suffix.clone();

    let candidates: Vec<String> = builder
        .model()
        .properties_of(entity)
        .filter(|p| !p.is_shadow())
        .filter(|p| is_key_property_name(&short_name, p.name(), &suffix))
        .map(|p| p.name().to_string())
        .collect();
    // `Id` wins over `<Type>Id`
    let Some(name) = candidates
        .iter()
        .find(|n| names_match(n, &suffix))
        .or_else(|| candidates.first())
        .cloned()
    else {
        return Ok(());
    };

    if builder
        .attempt(|b| b.primary_key(entity, &[name.clone()], ConfigurationSource::Convention))?
        .is_some()
    {
        debug!(entity = %short_name, key = %name, "primary key discovered");
    }
    Ok(())
}

/// Generate values for a single-property integer or guid primary key that
/// is not also a foreign key
fn configure_value_generation(builder: &mut InternalModelBuilder, entity: EntityTypeId) -> MetadataResult<()> {
    let model = builder.model();
    let Some(entity_type) = model.entity_type(entity) else {
        return Ok(());
    };
    let generated_key = entity_type
        .primary_key()
        .and_then(|k| model.key(k))
        .and_then(|k| match k.properties() {
            [single] => Some(*single),
            _ => None,
        });

    let changes: Vec<_> = model
        .properties_of(entity)
        .filter_map(|p| {
            let desired = Some(p.id()) == generated_key
                && p.value_type().is_generated_key_type()
                && model.foreign_keys_containing(p.id()).is_empty();
            let allowed =
                ConfigurationSource::can_set(p.generate_value_on_add_source(), ConfigurationSource::Convention);
            (allowed && p.generate_value_on_add() != desired).then_some((p.id(), desired))
        })
        .collect();

    for (property, desired) in changes {
        builder.attempt(|b| {
            b.set_generate_value_on_add(property, desired, ConfigurationSource::Convention)
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{builder_with, registry};
    use modelforge_core::{ConfigurationSource, TypeDescriptor, ValueType};

    #[test]
    fn test_id_property_becomes_primary_key() {
        let mut builder = builder_with(registry());
        let customer = builder
            .configure(|b| b.entity("Customer", ConfigurationSource::Explicit))
            .unwrap();
        let model = builder.model();
        let pk = model.primary_key(customer).unwrap();
        assert_eq!(model.property_names(pk.properties()), "Id");
        assert_eq!(pk.configuration_source(), ConfigurationSource::Convention);
        assert!(model.find_property(customer, "Id").unwrap().generate_value_on_add());
    }

    #[test]
    fn test_type_prefixed_key_name() {
        let registry = registry().with_type(
            TypeDescriptor::new("Shop.Invoice")
                .scalar("Number", ValueType::String)
                .scalar("InvoiceId", ValueType::Guid),
        );
        let mut builder = builder_with(registry);
        let invoice = builder
            .configure(|b| b.entity("Shop.Invoice", ConfigurationSource::Explicit))
            .unwrap();
        let pk = builder.model().primary_key(invoice).unwrap();
        assert_eq!(builder.model().property_names(pk.properties()), "InvoiceId");
    }

    #[test]
    fn test_explicit_key_replaces_discovered_key() {
        let registry = registry().with_type(
            TypeDescriptor::new("Country")
                .scalar("Id", ValueType::Int32)
                .scalar("Code", ValueType::String),
        );
        let mut builder = builder_with(registry);
        let country = builder
            .configure(|b| b.entity("Country", ConfigurationSource::Explicit))
            .unwrap();
        builder
            .configure(|b| b.primary_key(country, &["Code".to_string()], ConfigurationSource::Explicit))
            .unwrap();

        let model = builder.model();
        let pk = model.primary_key(country).unwrap();
        assert_eq!(model.property_names(pk.properties()), "Code");
        assert_eq!(model.entity_type(country).unwrap().keys().len(), 1);
        assert!(!model.find_property(country, "Id").unwrap().generate_value_on_add());
    }
}
