//! Read-only snapshot of a model
//!
//! Downstream consumers (mapping layers, diagnostics) get a plain serializable
//! tree with names instead of ids. There is no loading path; the builder is the
//! only way to produce a model.

use crate::Model;
use modelforge_core::{Annotations, ConfigurationSource, MetadataResult, TriState, ValueType};
use serde::Serialize;

/// Snapshot of a whole model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSnapshot {
    pub entity_types: Vec<EntityTypeSnapshot>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityTypeSnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clr_type: Option<String>,
    pub source: ConfigurationSource,
    pub properties: Vec<PropertySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
    pub keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
    pub navigations: Vec<NavigationSnapshot>,
    pub indexes: Vec<IndexSnapshot>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySnapshot {
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_index: Option<usize>,
    pub concurrency_token: bool,
    pub generate_value_on_add: bool,
    pub store_computed: TriState,
    pub use_store_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    pub source: ConfigurationSource,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeySnapshot {
    pub properties: Vec<String>,
    pub principal: String,
    pub principal_key: Vec<String>,
    pub unique: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_to_principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_to_dependent: Option<String>,
    pub source: ConfigurationSource,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationSnapshot {
    pub name: String,
    pub target: String,
    pub collection: bool,
    pub points_to_principal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSnapshot {
    pub properties: Vec<String>,
    pub unique: bool,
}

impl ModelSnapshot {
    /// Build a snapshot of `model`
    pub fn from_model(model: &Model) -> Self {
        let names = |ids: &[crate::PropertyId]| -> Vec<String> {
            ids.iter().map(|id| model.property_name(*id)).collect()
        };

        let entity_types = model
            .entity_types()
            .map(|entity| {
                let properties = model
                    .properties_of(entity.id())
                    .map(|p| PropertySnapshot {
                        name: p.name().to_string(),
                        value_type: p.value_type().clone(),
                        nullable: p.is_nullable(),
                        shadow_index: p.shadow_index(),
                        concurrency_token: p.is_concurrency_token(),
                        generate_value_on_add: p.generate_value_on_add(),
                        store_computed: p.is_store_computed(),
                        use_store_default: p.use_store_default(),
                        max_length: p.max_length(),
                        source: p.configuration_source(),
                        annotations: p.annotations.clone(),
                    })
                    .collect();

                let foreign_keys = model
                    .foreign_keys_of(entity.id())
                    .map(|fk| ForeignKeySnapshot {
                        properties: names(fk.properties()),
                        principal: model.entity_name(fk.principal()),
                        principal_key: model
                            .key(fk.principal_key())
                            .map(|k| names(k.properties()))
                            .unwrap_or_default(),
                        unique: fk.is_unique(),
                        required: fk.is_required(),
                        navigation_to_principal: fk
                            .navigation_to_principal()
                            .and_then(|n| model.navigation(n))
                            .map(|n| n.name().to_string()),
                        navigation_to_dependent: fk
                            .navigation_to_dependent()
                            .and_then(|n| model.navigation(n))
                            .map(|n| n.name().to_string()),
                        source: fk.configuration_source(),
                        annotations: fk.annotations.clone(),
                    })
                    .collect();

                let navigations = model
                    .navigations_of(entity.id())
                    .map(|n| NavigationSnapshot {
                        name: n.name().to_string(),
                        target: model
                            .navigation_target(n.id())
                            .map(|t| model.entity_name(t))
                            .unwrap_or_default(),
                        collection: model.is_collection_navigation(n.id()),
                        points_to_principal: n.points_to_principal(),
                    })
                    .collect();

                EntityTypeSnapshot {
                    name: entity.name().to_string(),
                    clr_type: entity.clr_type().map(str::to_string),
                    source: entity.configuration_source(),
                    properties,
                    primary_key: model.primary_key(entity.id()).map(|k| names(k.properties())),
                    keys: entity
                        .keys()
                        .iter()
                        .filter_map(|k| model.key(*k))
                        .map(|k| names(k.properties()))
                        .collect(),
                    foreign_keys,
                    navigations,
                    indexes: model
                        .indexes_of(entity.id())
                        .map(|i| IndexSnapshot {
                            properties: names(i.properties()),
                            unique: i.is_unique(),
                        })
                        .collect(),
                    annotations: entity.annotations.clone(),
                }
            })
            .collect();

        Self {
            entity_types,
            annotations: model.annotations().clone(),
        }
    }

    /// Find an entity type snapshot by name
    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeSnapshot> {
        self.entity_types.iter().find(|e| e.name == name)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> MetadataResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl EntityTypeSnapshot {
    pub fn property(&self, name: &str) -> Option<&PropertySnapshot> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation(&self, name: &str) -> Option<&NavigationSnapshot> {
        self.navigations.iter().find(|n| n.name == name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use modelforge_core::{Annotatable, ConfigurationSource::*};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_resolves_names() {
        let mut model = Model::new();
        let blog = model.add_entity_type("Blog", Some("Blog".into()), Explicit).unwrap();
        let post = model.add_entity_type("Post", Some("Post".into()), Explicit).unwrap();
        let blog_id = model.add_property(blog, "Id", ValueType::Int32, false, Convention).unwrap();
        let post_blog = model
            .add_property(post, "BlogId", ValueType::optional(ValueType::Int32), true, Convention)
            .unwrap();
        let pk = model.add_key(blog, vec![blog_id], Convention).unwrap();
        model.set_primary_key(blog, Some(pk), Convention).unwrap();
        let fk = model.add_foreign_key(post, vec![post_blog], pk, Convention).unwrap();
        model.add_navigation(fk, "Posts", false, Convention).unwrap();
        model
            .entity_type_mut(blog)
            .unwrap()
            .set_annotation("Relational:TableName", "Blogs");

        let snapshot = ModelSnapshot::from_model(&model);
        let blog = snapshot.entity_type("Blog").unwrap();
        assert_eq!(blog.primary_key, Some(vec!["Id".to_string()]));
        assert_eq!(
            blog.navigation("Posts"),
            Some(&NavigationSnapshot {
                name: "Posts".to_string(),
                target: "Post".to_string(),
                collection: true,
                points_to_principal: false,
            })
        );

        let post = snapshot.entity_type("Post").unwrap();
        assert_eq!(post.foreign_keys[0].principal, "Blog");
        assert!(!post.foreign_keys[0].required);
        assert_eq!(post.property("BlogId").unwrap().shadow_index, Some(0));

        let json = snapshot.to_json_pretty().unwrap();
        assert!(json.contains("\"Relational:TableName\": \"Blogs\""));
    }
}
