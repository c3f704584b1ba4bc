use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::{ConfigurationSource, MetadataResult};
use modelforge_metadata::ForeignKeyId;

/// A relationship is required when none of its foreign key properties can
/// hold null
pub struct RequiredDerivationConvention;

impl Convention for RequiredDerivationConvention {
    fn name(&self) -> &'static str {
        "required_derivation"
    }

    fn description(&self) -> &'static str {
        "Derive whether a relationship is required from foreign key nullability"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::PropertyNullabilityChanged(property) => {
                for fk in builder.model().foreign_keys_containing(*property) {
                    derive_required(builder, fk);
                }
                Ok(())
            }
            ModelEvent::ForeignKeyAdded(fk) | ModelEvent::ForeignKeyPropertiesChanged(fk) => {
                derive_required(builder, *fk);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn derive_required(builder: &mut InternalModelBuilder, fk: ForeignKeyId) {
    let model = builder.model();
    let Some(foreign_key) = model.foreign_key(fk) else {
        return;
    };
    if !ConfigurationSource::can_set(foreign_key.required_source(), ConfigurationSource::Convention) {
        return;
    }
    let required = foreign_key
        .properties()
        .iter()
        .all(|p| model.property(*p).is_some_and(|p| !p.is_nullable()));
    if required == foreign_key.is_required() {
        return;
    }
    if let Some(foreign_key) = builder.model_mut().foreign_key_mut(fk) {
        foreign_key.set_required(required, ConfigurationSource::Convention);
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{builder_with, registry};
    use crate::internal::RelationshipRequest;
    use modelforge_core::ConfigurationSource;

    #[test]
    fn test_required_follows_nullability() {
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
        // CustomerId is int?
        assert!(!builder.model().foreign_key(fk).unwrap().is_required());

        let customer_id = builder.model().find_property(order, "CustomerId").unwrap().id();
        builder
            .configure(|b| b.set_property_required(customer_id, true, ConfigurationSource::Explicit))
            .unwrap();
        let foreign_key = builder.model().foreign_key(fk).unwrap();
        assert!(foreign_key.is_required());
        assert_eq!(foreign_key.required_source(), Some(ConfigurationSource::Convention));
    }
}
