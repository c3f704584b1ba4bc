//! # Modelforge Metadata
//!
//! The metadata graph built by the model builder and read by downstream
//! consumers.
//!
//! ## Core Concepts
//!
//! - **EntityType**: a named type, optionally backed by a CLR-style type
//! - **Property**: a scalar member; shadow properties have no backing member
//! - **Key**: an ordered property list identifying instances; one may be primary
//! - **ForeignKey**: dependent properties referencing a principal key, with up
//!   to two navigations
//! - **Index**: an ordered property list, optionally unique
//! - **Model**: the arena that owns every element, addressed by typed ids
//!

macro_rules! impl_annotatable {
    ($ty:ty) => {
        impl modelforge_core::Annotatable for $ty {
            fn annotations(&self) -> &modelforge_core::Annotations {
                &self.annotations
            }

            fn annotations_mut(&mut self) -> &mut modelforge_core::Annotations {
                &mut self.annotations
            }
        }
    };
}
pub(crate) use impl_annotatable;

// Module declarations
pub mod arena;
pub mod entity;
pub mod foreign_key;
pub mod key;
pub mod model;
mod mutation;
pub mod property;
pub mod snapshot;
pub mod validation;

// Re-export commonly used types at crate root
pub use arena::{ArenaId, ArenaMark, EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId};
pub use entity::EntityType;
pub use foreign_key::{ForeignKey, Navigation};
pub use key::{Index, Key};
pub use model::{Model, Savepoint};
pub use property::Property;
pub use snapshot::ModelSnapshot;
pub use validation::{
    Diagnostic, DiagnosticCode, Severity, ValidationReport, ValidationRule, Validator,
};

// Re-export core types that are commonly used with the graph
pub use modelforge_core::{
    Annotatable, Annotations, ConfigurationSource, MetadataError, MetadataResult, TriState,
    ValueType,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
