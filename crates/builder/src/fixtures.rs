//! Backing types shared by the builder tests

use crate::config::BuilderConfig;
use crate::conventions::ConventionSet;
use crate::internal::InternalModelBuilder;
use modelforge_core::{CachedMemberAccessor, TypeDescriptor, TypeRegistry, ValueType};

/// Customer and Order with no navigations between them
pub(crate) fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with_type(
            TypeDescriptor::new("Customer")
                .scalar("Id", ValueType::Int32)
                .scalar("Name", ValueType::String),
        )
        .with_type(
            TypeDescriptor::new("Order")
                .scalar("Id", ValueType::Int32)
                .scalar("CustomerId", ValueType::optional(ValueType::Int32))
                .scalar("Quantity", ValueType::Int32),
        )
}

/// Blog and Post navigating to each other
pub(crate) fn blogging() -> TypeRegistry {
    TypeRegistry::new()
        .with_type(
            TypeDescriptor::new("Blog")
                .scalar("Id", ValueType::Int32)
                .scalar("Url", ValueType::String)
                .collection("Posts", "Post"),
        )
        .with_type(
            TypeDescriptor::new("Post")
                .scalar("Id", ValueType::Int32)
                .scalar("Title", ValueType::String)
                .scalar("BlogId", ValueType::Int32)
                .reference("Blog", "Blog"),
        )
}

/// Category with a parent reference and a children collection
pub(crate) fn categories() -> TypeRegistry {
    TypeRegistry::new().with_type(
        TypeDescriptor::new("Category")
            .scalar("Id", ValueType::Int32)
            .scalar("Name", ValueType::String)
            .reference("Parent", "Category")
            .collection("Children", "Category"),
    )
}

/// `E0 -> E1 -> ... -> E{len-1}`, each linked by a `Next` reference
pub(crate) fn chain(len: usize) -> TypeRegistry {
    (0..len).fold(TypeRegistry::new(), |registry, n| {
        let descriptor = TypeDescriptor::new(format!("E{n}")).scalar("Id", ValueType::Int32);
        let descriptor = if n + 1 < len {
            descriptor.reference("Next", format!("E{}", n + 1))
        } else {
            descriptor
        };
        registry.with_type(descriptor)
    })
}

pub(crate) fn builder_with(registry: TypeRegistry) -> InternalModelBuilder {
    InternalModelBuilder::new(
        CachedMemberAccessor::new(registry),
        ConventionSet::with_default_conventions(),
        BuilderConfig::default(),
    )
}
