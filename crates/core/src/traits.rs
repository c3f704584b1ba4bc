//! Core traits for modelforge
//!
//! Behaviour shared by every metadata element: self-validation and a free-form
//! annotation map.

use crate::error::MetadataResult;
use std::collections::BTreeMap;

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can check their own consistency
///
/// # Example
///
/// ```rust,ignore
/// use modelforge_core::{MetadataError, MetadataResult, Validatable};
///
/// struct Settings {
///     max_iterations: usize,
/// }
///
/// impl Validatable for Settings {
///     fn validate(&self) -> MetadataResult<()> {
///         if self.max_iterations == 0 {
///             return Err(MetadataError::validation("max_iterations must be positive"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    fn validate(&self) -> MetadataResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

// ============================================================================
// Annotatable Trait
// ============================================================================

/// Ordered string-to-string annotation map
pub type Annotations = BTreeMap<String, String>;

/// Trait for metadata elements that carry annotations
///
/// Annotations are opaque to the builder; the last write wins.
pub trait Annotatable {
    /// Get the annotation map
    fn annotations(&self) -> &Annotations;

    /// Get the annotation map mutably
    fn annotations_mut(&mut self) -> &mut Annotations;

    /// Get a single annotation
    fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations().get(name).map(String::as_str)
    }

    /// Set an annotation, returning the previous value
    fn set_annotation(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String>
    where
        Self: Sized,
    {
        self.annotations_mut().insert(name.into(), value.into())
    }

    /// Remove an annotation
    fn remove_annotation(&mut self, name: &str) -> Option<String> {
        self.annotations_mut().remove(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
