//! # Modelforge Core
//!
//! Core types, traits, and error handling for modelforge.
//!
//! This crate provides the foundational building blocks used by the metadata
//! graph and the model builder, including:
//!
//! - **Types**: configuration sources, value types, tri-state flags
//! - **Traits**: `Validatable` and `Annotatable`
//! - **Reflection**: the `MemberAccessor` abstraction over backing types
//! - **Errors**: unified error handling with `MetadataError` and `MetadataResult`
//!

pub mod error;
pub mod reflection;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{MetadataError, MetadataResult};
pub use reflection::{
    CachedMemberAccessor, MemberAccessor, MemberAttribute, MemberInfo, MemberKind,
    TypeDescriptor, TypeRegistry, short_name,
};
pub use traits::{Annotatable, Annotations, Validatable};
pub use types::{ConfigurationSource, Configured, SetOutcome, TriState, ValueType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
