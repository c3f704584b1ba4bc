//! Fluent configuration facade
//!
//! Every call here is explicit configuration. Each call runs as one unit:
//! the resolver step plus the conventions it triggers either all apply or
//! the model is left as it was before the call.

mod entity;
mod property;
mod relationship;

pub use entity::{EntityBuilder, IndexBuilder, KeyBuilder};
pub use property::PropertyBuilder;
pub use relationship::{
    CollectionNavigationBuilder, OneToOneBuilder, ReferenceNavigationBuilder, RelationshipBuilder,
};

use crate::config::BuilderConfig;
use crate::conventions::{self, ConventionSet};
use crate::internal::InternalModelBuilder;
use modelforge_core::{
    Annotatable, CachedMemberAccessor, ConfigurationSource, MemberAccessor, MetadataError,
    MetadataResult,
};
use modelforge_metadata::{Model, ModelSnapshot, Validator};
use tracing::{debug, info};

pub(crate) const EXPLICIT: ConfigurationSource = ConfigurationSource::Explicit;

/// Set an annotation on an element that must still exist
pub(crate) fn set_annotation<T: Annotatable>(
    element: Option<&mut T>,
    described: String,
    name: &str,
    value: &str,
) -> MetadataResult<()> {
    match element {
        Some(element) => {
            element.set_annotation(name, value);
            Ok(())
        }
        None => Err(MetadataError::internal(format!("{described} no longer exists"))),
    }
}

/// Entry point for configuring a model
pub struct ModelBuilder {
    inner: InternalModelBuilder,
}

impl ModelBuilder {
    /// Builder with default configuration and conventions
    pub fn new(accessor: impl MemberAccessor + 'static) -> Self {
        Self::with_config(accessor, BuilderConfig::default())
    }

    /// Builder running the default conventions the configuration enables
    pub fn with_config(accessor: impl MemberAccessor + 'static, config: BuilderConfig) -> Self {
        let conventions = ConventionSet::for_config(&config);
        Self::with_conventions(accessor, conventions, config)
    }

    pub fn with_conventions(
        accessor: impl MemberAccessor + 'static,
        conventions: ConventionSet,
        config: BuilderConfig,
    ) -> Self {
        debug!(conventions = ?conventions, "creating model builder");
        Self {
            inner: InternalModelBuilder::new(CachedMemberAccessor::new(accessor), conventions, config),
        }
    }

    /// Configure an entity type, adding it when missing
    pub fn entity(&mut self, name: &str) -> MetadataResult<EntityBuilder<'_>> {
        let entity = self.inner.configure(|b| b.entity(name, EXPLICIT))?;
        Ok(EntityBuilder::new(&mut self.inner, entity))
    }

    /// Exclude an entity type from the model
    pub fn ignore(&mut self, name: &str) -> MetadataResult<&mut Self> {
        self.inner.configure(|b| b.ignore_entity(name, EXPLICIT))?;
        Ok(self)
    }

    /// Lift an explicit ignore so the entity type can be configured again
    pub fn unignore(&mut self, name: &str) -> bool {
        self.inner.unignore_entity(name, EXPLICIT)
    }

    /// Set a model-level annotation
    pub fn annotation(&mut self, name: &str, value: &str) -> &mut Self {
        self.inner.model_mut().annotations_mut().insert(name.to_string(), value.to_string());
        self
    }

    pub fn model(&self) -> &Model {
        self.inner.model()
    }

    /// Serializable view of the model as configured so far
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::from_model(self.inner.model())
    }

    /// Resolver layer, for callers configuring below the fluent surface
    pub fn internal(&mut self) -> &mut InternalModelBuilder {
        &mut self.inner
    }

    /// Settle the model and hand it over
    ///
    /// Drops convention entity types nothing reaches any more, then validates
    /// unless the configuration turns validation off.
    pub fn finish(mut self) -> MetadataResult<Model> {
        if self.inner.config().is_enabled("unreachable_entity_types") {
            self.inner.configure(conventions::sweep_unreachable)?;
        }
        if self.inner.config().validate_on_finish {
            Validator::with_default_rules().validate_result(self.inner.model())?;
        }
        let model = self.inner.into_model();
        info!(
            entity_types = model.entity_type_count(),
            foreign_keys = model.foreign_keys().count(),
            "model built"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::ModelBuilder;
    use crate::config::BuilderConfig;
    use crate::fixtures::{blogging, categories, registry};
    use crate::internal::{NavigationRequest, RelationshipRequest};
    use modelforge_core::{
        Annotatable, ConfigurationSource, MetadataError, MetadataResult, TypeDescriptor, TypeRegistry,
        ValueType,
    };
    use modelforge_metadata::{EntityTypeId, ForeignKeyId, PropertyId};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Customer and Order without any foreign key member
    fn bare_registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(TypeDescriptor::new("Customer").scalar("Id", ValueType::Int32))
            .with_type(TypeDescriptor::new("Order").scalar("Id", ValueType::Int32))
    }

    /// Order and OrderDetails referencing each other
    fn order_details() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(
                TypeDescriptor::new("Order")
                    .scalar("Id", ValueType::Int32)
                    .reference("Details", "OrderDetails"),
            )
            .with_type(
                TypeDescriptor::new("OrderDetails")
                    .scalar("Id", ValueType::Int32)
                    .scalar("OrderId", ValueType::Int32)
                    .reference("Order", "Order"),
            )
    }

    fn configure_customer_orders(builder: &mut ModelBuilder) {
        builder.entity("Customer").unwrap();
        builder
            .entity("Order")
            .unwrap()
            .has_one("Customer", None)
            .unwrap()
            .with_many(None)
            .unwrap();
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    #[test]
    fn test_optional_relationship_uses_nullable_member() {
        let mut builder = ModelBuilder::new(registry());
        configure_customer_orders(&mut builder);

        let model = builder.model();
        let order = model.find_entity_type("Order").unwrap().id();
        let customer_id = model.find_property(order, "CustomerId").unwrap().id();
        let fk = model.foreign_keys_of(order).next().unwrap();

        assert_eq!(fk.properties(), &[customer_id]);
        assert!(!fk.is_required());
        assert!(!fk.has_navigations());
        assert!(model.properties_of(order).all(|p| !p.is_shadow()));
    }

    #[test]
    fn test_shadow_foreign_key_when_no_member_matches() {
        let mut builder = ModelBuilder::new(bare_registry());
        builder
            .entity("Customer")
            .unwrap()
            .has_many("Order", None)
            .unwrap()
            .with_one(None)
            .unwrap();

        let model = builder.model();
        let order = model.find_entity_type("Order").unwrap().id();
        let fk = model.foreign_keys_of(order).next().unwrap();
        let property = model.property(fk.properties()[0]).unwrap();

        assert_eq!(property.name(), "CustomerId");
        assert!(property.is_shadow());
        assert!(property.is_nullable());
        assert!(!fk.is_required());
    }

    #[test]
    fn test_primary_key_change_keeps_referenced_key() {
        let mut builder = ModelBuilder::new(registry());
        configure_customer_orders(&mut builder);
        let customer = builder.model().find_entity_type("Customer").unwrap().id();
        let id_key = builder.model().primary_key(customer).unwrap().id();

        builder.entity("Customer").unwrap().key(&["Name"]).unwrap();

        let model = builder.model();
        let name = model.find_property(customer, "Name").unwrap();
        assert_eq!(model.primary_key(customer).unwrap().properties(), &[name.id()]);
        assert!(!name.is_nullable());

        assert!(model.key(id_key).is_some());
        assert!(!model.is_primary_key(id_key));
        let fk = model.referencing_foreign_keys(customer)[0];
        assert_eq!(model.foreign_key(fk).unwrap().principal_key(), id_key);
    }

    #[test]
    fn test_explicit_principal_end_is_not_inverted() {
        let mut builder = ModelBuilder::new(order_details());
        builder.entity("Order").unwrap();
        builder
            .entity("Order")
            .unwrap()
            .has_one("OrderDetails", Some("Details"))
            .unwrap()
            .with_one(None)
            .unwrap()
            .foreign_key("OrderDetails", &["OrderId"])
            .unwrap();

        let mut details = builder.entity("OrderDetails").unwrap();
        let mut one_to_one = details
            .has_one("Order", Some("Order"))
            .unwrap()
            .with_one(Some("Details"))
            .unwrap();
        let err = one_to_one
            .referenced_key("OrderDetails", &["OrderId"])
            .err()
            .unwrap();
        assert!(matches!(err, MetadataError::RelationshipCannotBeInverted { .. }));

        let model = builder.model();
        let details = model.find_entity_type("OrderDetails").unwrap().id();
        let order_id = model.find_property(details, "OrderId").unwrap().id();
        let fk = model.foreign_keys_of(details).next().unwrap();
        assert_eq!(fk.properties(), &[order_id]);
        assert!(fk.is_unique());
        assert_eq!(model.foreign_keys().count(), 1);
    }

    #[test]
    fn test_ignoring_navigation_drops_discovered_entity_type() {
        let mut builder = ModelBuilder::new(blogging());
        builder.entity("Blog").unwrap();
        assert_eq!(builder.model().entity_type_count(), 2);

        builder.entity("Blog").unwrap().ignore("Posts").unwrap();

        let model = builder.model();
        assert!(model.find_entity_type("Post").is_none());
        assert_eq!(model.foreign_keys().count(), 0);
    }

    // ========================================================================
    // Self-referencing relationships
    // ========================================================================

    #[test]
    fn test_self_reference_is_discovered() {
        let mut builder = ModelBuilder::new(categories());
        let category = builder.entity("Category").unwrap().id();

        let model = builder.model();
        assert_eq!(model.entity_type_count(), 1);
        assert_eq!(model.foreign_keys().count(), 1);
        let fk = model.foreign_keys_of(category).next().unwrap();
        assert!(fk.is_self_referencing());
        assert!(!fk.is_unique());
        assert!(!fk.is_required());

        let parent = model.navigation(fk.navigation_to_principal().unwrap()).unwrap();
        let children = model.navigation(fk.navigation_to_dependent().unwrap()).unwrap();
        assert_eq!(parent.name(), "Parent");
        assert_eq!(children.name(), "Children");

        let parent_id = model.property(fk.properties()[0]).unwrap();
        assert_eq!(parent_id.name(), "ParentId");
        assert!(parent_id.is_shadow());
    }

    #[test]
    fn test_self_reference_rejects_one_name_for_both_ends() {
        let registry = TypeRegistry::new().with_type(
            TypeDescriptor::new("Node")
                .scalar("Id", ValueType::Int32)
                .reference("Link", "Node"),
        );
        let mut builder = ModelBuilder::new(registry);
        let err = builder
            .entity("Node")
            .unwrap()
            .has_one("Node", Some("Link"))
            .unwrap()
            .with_many(Some("Link"))
            .err()
            .unwrap();
        assert!(matches!(err, MetadataError::NavigationNameCollision { .. }));

        let model = builder.model();
        let fk = model.foreign_keys().next().unwrap();
        assert_eq!(model.foreign_keys().count(), 1);
        assert!(fk.navigation_to_dependent().is_none());
        let link = model.navigation(fk.navigation_to_principal().unwrap()).unwrap();
        assert_eq!(link.name(), "Link");
    }

    #[test]
    fn test_fixing_principal_end_swaps_self_reference_roles() {
        let registry =
            TypeRegistry::new().with_type(TypeDescriptor::new("Person").scalar("Id", ValueType::Int32));
        let mut builder = ModelBuilder::new(registry);
        let person = builder.entity("Person").unwrap().id();
        let mentor = RelationshipRequest::new(person, person)
            .with_navigation_to_principal(NavigationRequest::Named("Mentor".into()))
            .with_navigation_to_dependent(NavigationRequest::Named("Protege".into()))
            .unique(true);
        let fk = builder
            .internal()
            .configure(|b| b.relationship(&mentor, ConfigurationSource::Convention))
            .unwrap();

        let flipped = mentor.inverted().with_principal_end();
        let same = builder
            .internal()
            .configure(|b| b.relationship(&flipped, ConfigurationSource::Explicit))
            .unwrap();
        assert_eq!(same, fk);

        let model = builder.model();
        let foreign_key = model.foreign_key(fk).unwrap();
        let to_principal = model.navigation(foreign_key.navigation_to_principal().unwrap()).unwrap();
        let to_dependent = model.navigation(foreign_key.navigation_to_dependent().unwrap()).unwrap();
        assert_eq!(to_principal.name(), "Protege");
        assert!(to_principal.points_to_principal());
        assert_eq!(to_dependent.name(), "Mentor");
        assert!(!to_dependent.points_to_principal());
        assert_eq!(foreign_key.principal_end_source(), Some(ConfigurationSource::Explicit));
        assert_eq!(model.foreign_keys().count(), 1);
    }

    // ========================================================================
    // Facets and lifecycle
    // ========================================================================

    #[test]
    fn test_repeated_configuration_is_idempotent() {
        let mut builder = ModelBuilder::new(registry());
        configure_customer_orders(&mut builder);
        let first = builder.snapshot().to_json_pretty().unwrap();

        configure_customer_orders(&mut builder);
        assert_eq!(builder.snapshot().to_json_pretty().unwrap(), first);
    }

    #[test]
    fn test_property_facets_and_annotations() {
        let mut builder = ModelBuilder::new(registry());
        builder
            .entity("Customer")
            .unwrap()
            .property("Name")
            .unwrap()
            .required(true)
            .unwrap()
            .max_length(Some(80))
            .unwrap()
            .annotation("Relational:ColumnName", "customer_name")
            .unwrap();

        let model = builder.model();
        let customer = model.find_entity_type("Customer").unwrap().id();
        let name = model.find_property(customer, "Name").unwrap();
        assert!(!name.is_nullable());
        assert_eq!(name.max_length(), Some(80));
        assert_eq!(name.nullability_source(), Some(ConfigurationSource::Explicit));
        assert_eq!(name.annotation("Relational:ColumnName"), Some("customer_name"));
    }

    #[test]
    fn test_unique_index_on_property() {
        let mut builder = ModelBuilder::new(registry());
        let index = builder
            .entity("Customer")
            .unwrap()
            .index(&["Name"])
            .unwrap()
            .unique(true)
            .unwrap()
            .id();

        let index = builder.model().index(index).unwrap();
        assert!(index.is_unique());
        assert_eq!(index.configuration_source(), ConfigurationSource::Explicit);
    }

    #[test]
    fn test_failed_call_leaves_model_unchanged() {
        let mut builder = ModelBuilder::new(registry());
        configure_customer_orders(&mut builder);
        let before = builder.snapshot().to_json_pretty().unwrap();

        let err = builder.entity("Order").unwrap().key(&["Missing"]).err().unwrap();
        assert!(err.is_not_found());
        assert_eq!(builder.snapshot().to_json_pretty().unwrap(), before);
    }

    #[test]
    fn test_ignored_entity_type_is_not_discovered() {
        let mut builder = ModelBuilder::new(blogging());
        builder.ignore("Post").unwrap();
        builder.entity("Blog").unwrap();

        let model = builder.model();
        assert_eq!(model.entity_type_count(), 1);
        assert!(model.ignored_entity_type_source("Post").is_some());
        assert!(builder.entity("Post").is_err());
        assert!(builder.unignore("Post"));
        assert!(builder.entity("Post").is_ok());
    }

    #[test]
    fn test_finish_returns_validated_model() {
        let mut builder = ModelBuilder::new(blogging());
        builder.entity("Blog").unwrap();
        builder.annotation("Relational:DefaultSchema", "blog");

        let model = builder.finish().unwrap();
        assert_eq!(model.entity_type_count(), 2);
        assert_eq!(
            model.annotations().get("Relational:DefaultSchema").map(String::as_str),
            Some("blog")
        );
    }

    #[test]
    fn test_snapshot_lists_entity_types_in_order() {
        let mut builder = ModelBuilder::new(blogging());
        builder.entity("Blog").unwrap();

        let json = builder.snapshot().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let names: Vec<&str> = value["entity_types"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Blog", "Post"]);
    }

    #[test]
    fn test_disabled_convention_does_not_run() {
        let config = BuilderConfig::default().with_disabled_convention("key_discovery");
        let mut builder = ModelBuilder::with_config(registry(), config);
        let customer = builder.entity("Customer").unwrap().id();

        assert!(builder.model().primary_key(customer).is_none());
        assert!(builder.model().find_property(customer, "Id").is_some());
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn source(index: u8) -> ConfigurationSource {
        match index % 3 {
            0 => ConfigurationSource::Convention,
            1 => ConfigurationSource::DataAnnotation,
            _ => ConfigurationSource::Explicit,
        }
    }

    proptest! {
        #[test]
        fn prop_weaker_source_never_overwrites(ops in proptest::collection::vec((0u8..3, 1usize..500), 1..12)) {
            let mut builder = ModelBuilder::new(registry());
            let property = builder
                .entity("Customer")
                .unwrap()
                .shadow_property("Nickname", ValueType::String)
                .unwrap()
                .id();

            let mut strongest: Option<ConfigurationSource> = None;
            let mut expected = None;
            for (index, length) in ops {
                let src = source(index);
                let result = builder
                    .internal()
                    .configure(|b| b.set_max_length(property, Some(length), src));
                if expected == Some(length) {
                    // reconfirming the current value only upgrades the source
                    prop_assert!(result.is_ok());
                    strongest = strongest.max(Some(src));
                } else if ConfigurationSource::can_set(strongest, src) {
                    prop_assert!(result.is_ok());
                    strongest = Some(src);
                    expected = Some(length);
                } else {
                    prop_assert!(result.unwrap_err().is_rejection());
                }
                prop_assert_eq!(builder.model().property(property).unwrap().max_length(), expected);
            }
        }
    }

    /// Facets whose configuration source never weakens
    #[derive(Debug, Clone, Copy)]
    enum Facet {
        ValueType,
        Nullability,
        ForeignKeyProperties,
        Uniqueness,
    }

    struct FacetTarget {
        builder: ModelBuilder,
        order: EntityTypeId,
        nickname: PropertyId,
        motto: PropertyId,
        fk: ForeignKeyId,
    }

    const TYPES: [ValueType; 3] = [ValueType::String, ValueType::Int64, ValueType::Bytes];
    const FOREIGN_KEYS: [&str; 3] = ["CustomerId", "Quantity", "BuyerId"];

    fn facet_target() -> FacetTarget {
        let mut builder = ModelBuilder::new(registry());
        let customer = builder.entity("Customer").unwrap().id();
        let order = builder.entity("Order").unwrap().id();
        builder
            .entity("Order")
            .unwrap()
            .shadow_property("BuyerId", ValueType::Int32)
            .unwrap();
        let convention = ConfigurationSource::Convention;
        let nickname = builder
            .internal()
            .configure(|b| b.property(customer, "Nickname", Some(&ValueType::String), convention))
            .unwrap();
        let motto = builder
            .internal()
            .configure(|b| b.property(customer, "Motto", Some(&ValueType::String), convention))
            .unwrap();
        let request = RelationshipRequest::new(customer, order).with_principal_end();
        let fk = builder
            .internal()
            .configure(|b| b.relationship(&request, ConfigurationSource::Explicit))
            .unwrap();
        FacetTarget { builder, order, nickname, motto, fk }
    }

    impl FacetTarget {
        /// Current value, rendered for comparison, and its source
        fn state(&self, facet: Facet) -> (String, Option<ConfigurationSource>) {
            let model = self.builder.model();
            let nickname = model.property(self.nickname).unwrap();
            let motto = model.property(self.motto).unwrap();
            let fk = model.foreign_key(self.fk).unwrap();
            match facet {
                Facet::ValueType => (format!("{:?}", nickname.value_type()), nickname.value_type_source()),
                Facet::Nullability => (format!("{:?}", motto.is_nullable()), motto.nullability_source()),
                Facet::ForeignKeyProperties => (format!("{:?}", fk.properties()), fk.properties_source()),
                Facet::Uniqueness => (format!("{:?}", fk.is_unique()), fk.uniqueness_source()),
            }
        }

        fn wanted(&self, facet: Facet, choice: usize) -> String {
            match facet {
                Facet::ValueType => format!("{:?}", TYPES[choice % 3]),
                Facet::Nullability => format!("{:?}", choice % 2 == 1),
                Facet::ForeignKeyProperties => {
                    let name = FOREIGN_KEYS[choice % 3];
                    let id = self.builder.model().find_property(self.order, name).unwrap().id();
                    format!("{:?}", [id])
                }
                Facet::Uniqueness => format!("{:?}", choice % 2 == 1),
            }
        }

        fn apply(&mut self, facet: Facet, choice: usize, source: ConfigurationSource) -> MetadataResult<()> {
            let (nickname, motto, fk) = (self.nickname, self.motto, self.fk);
            let inner = self.builder.internal();
            match facet {
                Facet::ValueType => {
                    inner.configure(|b| b.set_property_type(nickname, TYPES[choice % 3].clone(), source))
                }
                Facet::Nullability => {
                    inner.configure(|b| b.set_property_required(motto, choice % 2 == 0, source))
                }
                Facet::ForeignKeyProperties => {
                    let foreign_key = inner.model().foreign_key(fk).unwrap();
                    let request = RelationshipRequest::new(foreign_key.principal(), foreign_key.dependent())
                        .with_foreign_key(vec![FOREIGN_KEYS[choice % 3].to_string()])
                        .for_existing(fk);
                    inner.configure(|b| b.relationship(&request, source).map(|_| ()))
                }
                Facet::Uniqueness => {
                    inner.configure(|b| b.set_relationship_unique(fk, choice % 2 == 1, source))
                }
            }
        }
    }

    fn facet(index: u8) -> Facet {
        match index % 4 {
            0 => Facet::ValueType,
            1 => Facet::Nullability,
            2 => Facet::ForeignKeyProperties,
            _ => Facet::Uniqueness,
        }
    }

    proptest! {
        #[test]
        fn prop_facet_sources_only_grow(ops in proptest::collection::vec((0u8..4, 0u8..3, 0usize..6), 1..16)) {
            let mut target = facet_target();
            for (facet_index, source_index, choice) in ops {
                let (facet, src) = (facet(facet_index), source(source_index));
                let (current, before) = target.state(facet);
                let wanted = target.wanted(facet, choice);

                let result = target.apply(facet, choice, src);
                let (value, after) = target.state(facet);
                if current == wanted {
                    prop_assert!(result.is_ok(), "{:?} at {:?}: {:?}", facet, src, result);
                    prop_assert_eq!(value, current);
                    prop_assert_eq!(after, Some(src.max(before)));
                } else if ConfigurationSource::can_set(before, src) {
                    prop_assert!(result.is_ok(), "{:?} at {:?}: {:?}", facet, src, result);
                    prop_assert_eq!(value, wanted);
                    prop_assert_eq!(after, Some(src));
                } else {
                    prop_assert!(result.unwrap_err().is_rejection());
                    prop_assert_eq!(value, current);
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
