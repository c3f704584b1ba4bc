//! Error types for modelforge
//!
//! This module provides unified error handling across the metadata graph and
//! the model builder: configuration conflicts, lookups of missing elements,
//! relationship shape errors, validation, and configuration loading.

use thiserror::Error;

/// The main error type for modelforge
#[derive(Debug, Error)]
pub enum MetadataError {
    // ========================================================================
    // Rejections
    // ========================================================================
    /// A stronger source already configured this element differently
    #[error("Conflicting configuration for '{element}': {message}")]
    ConflictingConfiguration { element: String, message: String },

    /// The member was ignored by a stronger source
    #[error("Member '{member}' of entity type '{entity}' is ignored")]
    IgnoredMember { entity: String, member: String },

    /// The entity type was ignored by a stronger source
    #[error("Entity type '{0}' is ignored")]
    IgnoredEntityType(String),

    /// A property with a non-nullable value type cannot become optional
    #[error(
        "Property '{entity}.{property}' of type '{value_type}' cannot be made optional"
    )]
    NonNullableProperty {
        entity: String,
        property: String,
        value_type: String,
    },

    // ========================================================================
    // Not Found Errors
    // ========================================================================
    /// Entity type not found
    #[error("Entity type not found: {0}")]
    EntityTypeNotFound(String),

    /// Property not found and no type given to create a shadow property
    #[error("Property '{property}' not found on entity type '{entity}'")]
    PropertyNotFound { entity: String, property: String },

    /// No key over the given properties
    #[error("Key ({properties}) not found on entity type '{entity}'")]
    KeyNotFound { entity: String, properties: String },

    /// The principal has no primary key and none was requested
    #[error("Entity type '{0}' has no primary key to act as principal key")]
    PrincipalKeyNotFound(String),

    /// Navigation not found
    #[error("Navigation '{navigation}' not found on entity type '{entity}'")]
    NavigationNotFound { entity: String, navigation: String },

    /// Foreign key handle no longer resolves
    #[error("Foreign key not found: {0}")]
    ForeignKeyNotFound(String),

    // ========================================================================
    // Relationship Errors
    // ========================================================================
    /// FK property count differs from the principal key
    #[error(
        "Foreign key {dependent}({dependent_properties}) does not match principal key \
         {principal}({principal_properties}): property counts differ"
    )]
    ForeignKeyCountMismatch {
        dependent: String,
        dependent_properties: String,
        principal: String,
        principal_properties: String,
    },

    /// FK property type differs from the matching principal key property
    #[error(
        "Foreign key property '{dependent}.{dependent_property}' of type '{dependent_type}' \
         is incompatible with principal key property '{principal}.{principal_property}' \
         of type '{principal_type}'"
    )]
    ForeignKeyTypeMismatch {
        dependent: String,
        dependent_property: String,
        dependent_type: String,
        principal: String,
        principal_property: String,
        principal_type: String,
    },

    /// The relationship's principal end was fixed explicitly
    #[error(
        "Relationship between '{principal}' and '{dependent}' cannot be inverted: \
         its principal end was configured explicitly"
    )]
    RelationshipCannotBeInverted { principal: String, dependent: String },

    /// Navigation name clashes with another member
    #[error("Navigation '{entity}.{navigation}' cannot be configured: {message}")]
    NavigationNameCollision {
        entity: String,
        navigation: String,
        message: String,
    },

    /// Key is referenced by a foreign key configured at a stronger source
    #[error("Key {key} on '{entity}' is referenced by foreign key {foreign_key}")]
    KeyInUse {
        entity: String,
        key: String,
        foreign_key: String,
    },

    // ========================================================================
    // Duplicate Errors
    // ========================================================================
    /// Duplicate entity type name
    #[error("Duplicate entity type name: '{0}' already exists")]
    DuplicateEntityType(String),

    /// Duplicate property name
    #[error("Duplicate property name: '{property}' already exists on entity type '{entity}'")]
    DuplicateProperty { entity: String, property: String },

    // ========================================================================
    // Validation & Configuration Errors
    // ========================================================================
    /// Finished model failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid builder configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Builder configuration failed to parse
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Create a conflicting configuration error
    pub fn conflicting(element: impl Into<String>, msg: impl Into<String>) -> Self {
        MetadataError::ConflictingConfiguration {
            element: element.into(),
            message: msg.into(),
        }
    }

    /// Create a navigation collision error
    pub fn navigation_collision(
        entity: impl Into<String>,
        navigation: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        MetadataError::NavigationNameCollision {
            entity: entity.into(),
            navigation: navigation.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        MetadataError::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        MetadataError::Internal(msg.into())
    }

    /// Check if this error means a stronger source refused the change
    ///
    /// Conventions treat these as "leave the model alone".
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MetadataError::ConflictingConfiguration { .. }
                | MetadataError::IgnoredMember { .. }
                | MetadataError::IgnoredEntityType(_)
        )
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetadataError::EntityTypeNotFound(_)
                | MetadataError::PropertyNotFound { .. }
                | MetadataError::KeyNotFound { .. }
                | MetadataError::PrincipalKeyNotFound(_)
                | MetadataError::NavigationNotFound { .. }
                | MetadataError::ForeignKeyNotFound(_)
        )
    }

    /// Check if this error concerns the shape of a relationship
    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            MetadataError::ForeignKeyCountMismatch { .. }
                | MetadataError::ForeignKeyTypeMismatch { .. }
                | MetadataError::RelationshipCannotBeInverted { .. }
                | MetadataError::NavigationNameCollision { .. }
                | MetadataError::PrincipalKeyNotFound(_)
        )
    }
}

/// Result type alias using MetadataError
pub type MetadataResult<T> = Result<T, MetadataError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_error() {
        let err = MetadataError::conflicting("Order.Customer", "required set explicitly");
        assert!(err.is_rejection());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Conflicting configuration for 'Order.Customer': required set explicitly"
        );
    }

    #[test]
    fn test_ignored_errors_are_rejections() {
        let err = MetadataError::IgnoredMember {
            entity: "Order".to_string(),
            member: "Customer".to_string(),
        };
        assert!(err.is_rejection());
        assert!(MetadataError::IgnoredEntityType("Audit".to_string()).is_rejection());
    }

    #[test]
    fn test_not_found_errors() {
        let err = MetadataError::EntityTypeNotFound("Customer".to_string());
        assert!(err.is_not_found());
        assert!(!err.is_rejection());
        assert_eq!(err.to_string(), "Entity type not found: Customer");

        let err = MetadataError::PrincipalKeyNotFound("Customer".to_string());
        assert!(err.is_not_found());
        assert!(err.is_relationship());
    }

    #[test]
    fn test_relationship_errors() {
        let err = MetadataError::ForeignKeyCountMismatch {
            dependent: "Order".to_string(),
            dependent_properties: "CustomerId".to_string(),
            principal: "Customer".to_string(),
            principal_properties: "Id, Region".to_string(),
        };
        assert!(err.is_relationship());
        assert!(!err.is_rejection());

        let err = MetadataError::navigation_collision("Node", "Parent", "same name on both ends");
        assert!(err.is_relationship());
        assert_eq!(
            err.to_string(),
            "Navigation 'Node.Parent' cannot be configured: same name on both ends"
        );
    }

    #[test]
    fn test_duplicate_errors() {
        let err = MetadataError::DuplicateProperty {
            entity: "Customer".to_string(),
            property: "Name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate property name: 'Name' already exists on entity type 'Customer'"
        );
    }

    #[test]
    fn test_config_parse_error_conversion() {
        let parse_err = toml::from_str::<toml::Value>("naming = ").unwrap_err();
        let err: MetadataError = parse_err.into();
        assert!(matches!(err, MetadataError::ConfigParse(_)));
    }
}
