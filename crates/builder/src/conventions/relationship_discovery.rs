use super::Convention;
use crate::events::ModelEvent;
use crate::internal::{InternalModelBuilder, NavigationRequest, RelationshipRequest};
use crate::naming::{foreign_key_name_candidates, normalize};
use modelforge_core::{ConfigurationSource, MemberInfo, MetadataResult};
use modelforge_metadata::{EntityTypeId, Model};
use tracing::debug;

/// Creates relationships for navigation members of backing types
///
/// A navigation member is paired with the single member on the target type
/// pointing back. Collection and reference make a one-to-many relationship
/// with the collection on the principal; two references make a one-to-one
/// relationship; a lone member makes a relationship with no inverse.
pub struct RelationshipDiscoveryConvention;

impl Convention for RelationshipDiscoveryConvention {
    fn name(&self) -> &'static str {
        "relationship_discovery"
    }

    fn description(&self) -> &'static str {
        "Create relationships for navigation members"
    }

    fn apply(&self, builder: &mut InternalModelBuilder, event: &ModelEvent) -> MetadataResult<()> {
        match event {
            ModelEvent::EntityTypeAdded(entity) => discover_relationships(builder, *entity),
            ModelEvent::PrimaryKeyChanged { entity, .. } => {
                let referencing = entity_types_navigating_to(builder, *entity);
                discover_relationships(builder, *entity)?;
                for other in referencing {
                    discover_relationships(builder, other)?;
                }
                Ok(())
            }
            ModelEvent::MemberIgnored {
                entity,
                name,
                foreign_key,
            } => {
                if let Some(fk) = *foreign_key {
                    let by_convention = builder
                        .model()
                        .foreign_key(fk)
                        .is_some_and(|f| f.configuration_source() == ConfigurationSource::Convention);
                    if by_convention {
                        builder.attempt(|b| b.remove_relationship(fk))?;
                    }
                }
                let target = member_target(builder, *entity, name);
                discover_relationships(builder, *entity)?;
                if let Some(target) = target {
                    discover_relationships(builder, target)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn discover_relationships(builder: &mut InternalModelBuilder, entity: EntityTypeId) -> MetadataResult<()> {
    let Some(members) = builder
        .model()
        .entity_type(entity)
        .and_then(|e| e.clr_type())
        .and_then(|t| builder.accessor().members(t))
    else {
        return Ok(());
    };
    for member in members.iter().filter(|m| m.is_navigation()) {
        discover_navigation(builder, entity, member)?;
    }
    Ok(())
}

fn discover_navigation(
    builder: &mut InternalModelBuilder,
    entity: EntityTypeId,
    member: &MemberInfo,
) -> MetadataResult<()> {
    let model = builder.model();
    let Some(entity_type) = model.entity_type(entity) else {
        return Ok(());
    };
    if entity_type.is_ignored(&member.name)
        || model.find_navigation(entity, &member.name).is_some()
        || model.find_property(entity, &member.name).is_some()
    {
        return Ok(());
    }
    let Some(target_name) = member.target_type() else {
        return Ok(());
    };
    if model.ignored_entity_type_source(target_name).is_some() {
        return Ok(());
    }
    let target_name = target_name.to_string();

    let Some(target) = builder.attempt(|b| b.entity(&target_name, ConfigurationSource::Convention))? else {
        return Ok(());
    };
    let inverse = find_inverse(builder, entity, member, target);
    let Some(request) = relationship_request(builder, entity, member, target, inverse.as_ref()) else {
        return Ok(());
    };

    if let Some(fk) = builder.attempt(|b| b.relationship(&request, ConfigurationSource::Convention))? {
        debug!(
            navigation = %member.name,
            foreign_key = %builder.model().describe_foreign_key(fk),
            "relationship discovered"
        );
    }
    Ok(())
}

/// The single member of the target type navigating back to `entity`
fn find_inverse(
    builder: &InternalModelBuilder,
    entity: EntityTypeId,
    member: &MemberInfo,
    target: EntityTypeId,
) -> Option<MemberInfo> {
    let model = builder.model();
    let entity_clr = model.entity_type(entity)?.clr_type()?;
    let target_type = model.entity_type(target)?;
    let members = builder.accessor().members(target_type.clr_type()?)?;

    let candidates: Vec<&MemberInfo> = members
        .iter()
        .filter(|m| m.target_type() == Some(entity_clr))
        .filter(|m| !(entity == target && m.name == member.name))
        .filter(|m| !target_type.is_ignored(&m.name))
        .filter(|m| model.find_property(target, &m.name).is_none())
        .filter(|m| is_free_inverse(model, target, &m.name, &member.name))
        .collect();
    match candidates.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

/// Check if `candidate` is not yet a navigation, or one whose relationship
/// has no navigation on the other side, or has `member` there
fn is_free_inverse(model: &Model, target: EntityTypeId, candidate: &str, member: &str) -> bool {
    let Some(navigation) = model.find_navigation(target, candidate) else {
        return true;
    };
    let opposite = model
        .foreign_key(navigation.foreign_key())
        .and_then(|fk| fk.navigation(!navigation.points_to_principal()))
        .and_then(|id| model.navigation(id));
    opposite.map_or(true, |n| n.name() == member)
}

fn relationship_request(
    builder: &InternalModelBuilder,
    entity: EntityTypeId,
    member: &MemberInfo,
    target: EntityTypeId,
    inverse: Option<&MemberInfo>,
) -> Option<RelationshipRequest> {
    let named = |name: &str| NavigationRequest::Named(name.to_string());

    let request = match (member.is_collection(), inverse) {
        // Many-to-many is not discovered
        (true, Some(inverse)) if inverse.is_collection() => return None,
        (true, inverse) => RelationshipRequest::new(entity, target)
            .with_navigation_to_dependent(named(&member.name))
            .with_navigation_to_principal(
                inverse.map_or(NavigationRequest::Unspecified, |i| named(&i.name)),
            )
            .unique(false)
            .with_principal_end(),
        (false, Some(inverse)) if inverse.is_collection() => RelationshipRequest::new(target, entity)
            .with_navigation_to_principal(named(&member.name))
            .with_navigation_to_dependent(named(&inverse.name))
            .unique(false)
            .with_principal_end(),
        (false, Some(inverse)) => {
            // The side carrying foreign-key-like members is the dependent
            let target_is_dependent = has_foreign_key_member(builder, target, &inverse.name, entity)
                && !has_foreign_key_member(builder, entity, &member.name, target);
            let (principal, dependent, to_principal, to_dependent) = if target_is_dependent {
                (entity, target, &inverse.name, &member.name)
            } else {
                (target, entity, &member.name, &inverse.name)
            };
            RelationshipRequest::new(principal, dependent)
                .with_navigation_to_principal(named(to_principal))
                .with_navigation_to_dependent(named(to_dependent))
                .unique(true)
        }
        (false, None) => {
            RelationshipRequest::new(target, entity).with_navigation_to_principal(named(&member.name))
        }
    };
    Some(request)
}

/// Check if `dependent` has a scalar member named like a foreign key to
/// `principal` reached through `navigation`
fn has_foreign_key_member(
    builder: &InternalModelBuilder,
    dependent: EntityTypeId,
    navigation: &str,
    principal: EntityTypeId,
) -> bool {
    let model = builder.model();
    let Some(principal_type) = model.entity_type(principal) else {
        return false;
    };
    let key_property = principal_type
        .primary_key()
        .and_then(|k| model.key(k))
        .and_then(|k| match k.properties() {
            [single] => model.property(*single).map(|p| p.name().to_string()),
            _ => None,
        })
        .unwrap_or_else(|| builder.config().key_suffix.clone());
    let candidates = foreign_key_name_candidates(&[navigation, principal_type.short_name()], &key_property);

    let Some(members) = model
        .entity_type(dependent)
        .and_then(|e| e.clr_type())
        .and_then(|t| builder.accessor().members(t))
    else {
        return false;
    };
    members
        .iter()
        .any(|m| !m.is_navigation() && candidates.contains(&normalize(&m.name)))
}

/// Entity types with a navigation member whose target is `entity`
fn entity_types_navigating_to(builder: &InternalModelBuilder, entity: EntityTypeId) -> Vec<EntityTypeId> {
    let model = builder.model();
    let Some(name) = model.entity_type(entity).and_then(|e| e.clr_type()) else {
        return Vec::new();
    };
    model
        .entity_types()
        .filter(|e| e.id() != entity)
        .filter(|e| {
            e.clr_type()
                .and_then(|t| builder.accessor().members(t))
                .is_some_and(|members| members.iter().any(|m| m.target_type() == Some(name)))
        })
        .map(|e| e.id())
        .collect()
}

/// Entity type targeted by a navigation member of `entity`
fn member_target(builder: &InternalModelBuilder, entity: EntityTypeId, member: &str) -> Option<EntityTypeId> {
    let model = builder.model();
    let clr_type = model.entity_type(entity)?.clr_type()?;
    let member = builder.accessor().find_member(clr_type, member)?;
    model.find_entity_type(member.target_type()?).map(|e| e.id())
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{blogging, builder_with};
    use modelforge_core::{ConfigurationSource, TypeDescriptor, TypeRegistry, ValueType};

    #[test]
    fn test_collection_and_reference_form_one_relationship() {
        let mut builder = builder_with(blogging());
        let blog = builder
            .configure(|b| b.entity("Blog", ConfigurationSource::Explicit))
            .unwrap();
        let model = builder.model();
        let post = model.find_entity_type("Post").unwrap().id();

        let fks: Vec<_> = model.foreign_keys_of(post).collect();
        assert_eq!(fks.len(), 1);
        let fk = fks[0];
        assert_eq!(fk.principal(), blog);
        assert!(!fk.is_unique());
        assert_eq!(model.property_names(fk.properties()), "BlogId");
        assert!(model.properties_of(post).all(|p| !p.is_shadow()));
        assert_eq!(model.find_navigation(blog, "Posts").unwrap().foreign_key(), fk.id());
        assert_eq!(model.find_navigation(post, "Blog").unwrap().foreign_key(), fk.id());
    }

    #[test]
    fn test_reference_without_inverse() {
        let registry = TypeRegistry::new()
            .with_type(TypeDescriptor::new("Author").scalar("Id", ValueType::Int32))
            .with_type(
                TypeDescriptor::new("Note")
                    .scalar("Id", ValueType::Int32)
                    .reference("Author", "Author"),
            );
        let mut builder = builder_with(registry);
        let note = builder
            .configure(|b| b.entity("Note", ConfigurationSource::Explicit))
            .unwrap();
        let model = builder.model();
        let author = model.find_entity_type("Author").unwrap().id();

        let fk = model.foreign_keys_of(note).next().unwrap();
        assert_eq!(fk.principal(), author);
        assert!(fk.navigation_to_dependent().is_none());
        assert_eq!(model.property_names(fk.properties()), "AuthorId");
        assert!(model.property(fk.properties()[0]).unwrap().is_shadow());
        assert!(!fk.is_required());
    }

    #[test]
    fn test_ignored_navigation_keeps_the_other_side() {
        let mut builder = builder_with(blogging());
        let blog = builder
            .configure(|b| b.entity("Blog", ConfigurationSource::Explicit))
            .unwrap();
        let post = builder.model().find_entity_type("Post").unwrap().id();
        builder
            .configure(|b| b.ignore_member(post, "Blog", ConfigurationSource::Explicit))
            .unwrap();

        let model = builder.model();
        assert!(model.find_navigation(post, "Blog").is_none());
        let posts = model.find_navigation(blog, "Posts").unwrap();
        let fk = model.foreign_key(posts.foreign_key()).unwrap();
        assert_eq!(fk.dependent(), post);
        assert!(fk.navigation_to_principal().is_none());
        assert_eq!(model.property_names(fk.properties()), "BlogId");
    }

    #[test]
    fn test_one_to_one_dependent_has_foreign_key_member() {
        let registry = TypeRegistry::new()
            .with_type(
                TypeDescriptor::new("Person")
                    .scalar("Id", ValueType::Int32)
                    .reference("Passport", "Passport"),
            )
            .with_type(
                TypeDescriptor::new("Passport")
                    .scalar("Id", ValueType::Int32)
                    .scalar("PersonId", ValueType::Int32)
                    .reference("Holder", "Person"),
            );
        let mut builder = builder_with(registry);
        let person = builder
            .configure(|b| b.entity("Person", ConfigurationSource::Explicit))
            .unwrap();
        let model = builder.model();
        let passport = model.find_entity_type("Passport").unwrap().id();

        let fk = model.foreign_keys_of(passport).next().unwrap();
        assert_eq!(fk.principal(), person);
        assert!(fk.is_unique());
        assert_eq!(model.property_names(fk.properties()), "PersonId");
        assert!(model.foreign_keys_of(person).next().is_none());
    }
}
