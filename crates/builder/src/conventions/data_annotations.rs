use super::Convention;
use crate::events::ModelEvent;
use crate::internal::InternalModelBuilder;
use modelforge_core::{ConfigurationSource, MemberAttribute, MetadataResult};
use modelforge_metadata::{EntityTypeId, PropertyId};

const SOURCE: ConfigurationSource = ConfigurationSource::DataAnnotation;

/// Applies member attributes to the properties they mark
pub struct DataAnnotationConvention;

impl Convention for DataAnnotationConvention {
    fn name(&self) -> &'static str {
        "data_annotations"
    }

    fn description(&self) -> &'static str {
        "Apply key, required, max length and concurrency attributes of backing members"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::PropertyAdded(property) => apply_attributes(builder, *property),
            _ => Ok(()),
        }
    }
}

fn apply_attributes(builder: &mut InternalModelBuilder, id: PropertyId) -> MetadataResult<()> {
    let Some(property) = builder.model().property(id) else {
        return Ok(());
    };
    if property.is_shadow() {
        return Ok(());
    }
    let entity = property.entity();
    let name = property.name().to_string();
    let Some(member) = builder
        .model()
        .entity_type(entity)
        .and_then(|e| e.clr_type())
        .and_then(|t| builder.accessor().find_member(t, &name))
    else {
        return Ok(());
    };

    for attribute in &member.attributes {
        match attribute {
            MemberAttribute::Required => {
                builder.attempt(|b| b.set_property_required(id, true, SOURCE))?;
            }
            MemberAttribute::MaxLength(length) => {
                builder.attempt(|b| b.set_max_length(id, Some(*length), SOURCE))?;
            }
            MemberAttribute::ConcurrencyCheck => {
                builder.attempt(|b| b.set_concurrency_token(id, true, SOURCE))?;
            }
            MemberAttribute::Key => configure_key_attribute(builder, entity)?,
            MemberAttribute::NotMapped => {}
        }
    }
    Ok(())
}

/// Make the key-marked members the primary key once all of them are properties
fn configure_key_attribute(builder: &mut InternalModelBuilder, entity: EntityTypeId) -> MetadataResult<()> {
    let Some(members) = builder
        .model()
        .entity_type(entity)
        .and_then(|e| e.clr_type())
        .and_then(|t| builder.accessor().members(t))
    else {
        return Ok(());
    };
    let names: Vec<String> = members
        .iter()
        .filter(|m| m.has_attribute(&MemberAttribute::Key))
        .map(|m| m.name.clone())
        .collect();
    let all_present = names
        .iter()
        .all(|n| builder.model().find_property(entity, n).is_some());
    if names.is_empty() || !all_present {
        return Ok(());
    }
    builder.attempt(|b| b.primary_key(entity, &names, SOURCE))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fixtures::builder_with;
    use modelforge_core::{
        ConfigurationSource, MemberAttribute, MemberInfo, TypeDescriptor, TypeRegistry, ValueType,
    };

    fn annotated() -> TypeRegistry {
        TypeRegistry::new().with_type(
            TypeDescriptor::new("Book")
                .with_member(MemberInfo::scalar("Isbn", ValueType::String).with_attribute(MemberAttribute::Key))
                .with_member(
                    MemberInfo::scalar("Title", ValueType::String)
                        .with_attribute(MemberAttribute::Required)
                        .with_attribute(MemberAttribute::MaxLength(200)),
                )
                .with_member(
                    MemberInfo::scalar("Version", ValueType::Int64)
                        .with_attribute(MemberAttribute::ConcurrencyCheck),
                ),
        )
    }

    #[test]
    fn test_attributes_configure_properties() {
        let mut builder = builder_with(annotated());
        let book = builder
            .configure(|b| b.entity("Book", ConfigurationSource::Explicit))
            .unwrap();
        let model = builder.model();

        let title = model.find_property(book, "Title").unwrap();
        assert!(!title.is_nullable());
        assert_eq!(title.nullability_source(), Some(ConfigurationSource::DataAnnotation));
        assert_eq!(title.max_length(), Some(200));
        assert!(model.find_property(book, "Version").unwrap().is_concurrency_token());

        let pk = model.primary_key(book).unwrap();
        assert_eq!(model.property_names(pk.properties()), "Isbn");
        assert_eq!(pk.configuration_source(), ConfigurationSource::DataAnnotation);
    }

    #[test]
    fn test_explicit_configuration_beats_attributes() {
        let mut builder = builder_with(annotated());
        let book = builder
            .configure(|b| b.entity("Book", ConfigurationSource::Explicit))
            .unwrap();
        let title = builder.model().find_property(book, "Title").unwrap().id();
        builder
            .configure(|b| b.set_max_length(title, Some(80), ConfigurationSource::Explicit))
            .unwrap();
        assert_eq!(builder.model().property(title).unwrap().max_length(), Some(80));

        let err = builder
            .configure(|b| b.set_max_length(title, Some(10), ConfigurationSource::DataAnnotation))
            .unwrap_err();
        assert!(err.is_rejection());
    }
}
