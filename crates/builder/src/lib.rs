//! # Modelforge Builder
//!
//! Builds a [`modelforge_metadata::Model`] from backing type descriptions,
//! conventions and explicit configuration.
//!
//! ## Layers
//!
//! - **Fluent facade** ([`ModelBuilder`]): explicit, chainable configuration
//! - **Resolvers** ([`InternalModelBuilder`]): find-or-create operations that
//!   respect configuration sources and raise events
//! - **Conventions** ([`ConventionSet`]): react to events and fill in what
//!   nobody configured
//!
//! ## Example
//!
//! ```
//! use modelforge_builder::ModelBuilder;
//! use modelforge_core::{TypeDescriptor, TypeRegistry, ValueType};
//!
//! let registry = TypeRegistry::new()
//!     .with_type(TypeDescriptor::new("Blog").scalar("Id", ValueType::Int32).collection("Posts", "Post"))
//!     .with_type(TypeDescriptor::new("Post").scalar("Id", ValueType::Int32).reference("Blog", "Blog"));
//!
//! let mut builder = ModelBuilder::new(registry);
//! builder.entity("Blog")?;
//! let model = builder.finish()?;
//! assert_eq!(model.entity_type_count(), 2);
//! # Ok::<(), modelforge_core::MetadataError>(())
//! ```

pub mod config;
pub mod conventions;
pub mod events;
pub mod fluent;
pub mod internal;
pub mod naming;

#[cfg(test)]
mod fixtures;

pub use config::{BuilderConfig, NamingStyle};
pub use conventions::{Convention, ConventionSet};
pub use events::ModelEvent;
pub use fluent::{
    CollectionNavigationBuilder, EntityBuilder, IndexBuilder, KeyBuilder, ModelBuilder,
    OneToOneBuilder, PropertyBuilder, ReferenceNavigationBuilder, RelationshipBuilder,
};
pub use internal::{InternalModelBuilder, NavigationRequest, RelationshipRequest};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
