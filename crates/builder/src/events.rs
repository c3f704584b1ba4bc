//! Model change events
//!
//! Every structural change made by the resolvers is recorded as an event.
//! Events are queued and handed to the convention set in order; removed
//! elements are described by name since their ids no longer resolve.

use modelforge_metadata::{EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId};

/// A structural change to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    EntityTypeAdded(EntityTypeId),
    EntityTypeRemoved { name: String },
    EntityTypeIgnored { name: String },

    PropertyAdded(PropertyId),
    PropertyRemoved { entity: EntityTypeId, name: String },
    PropertyNullabilityChanged(PropertyId),

    KeyAdded(KeyId),
    KeyRemoved { entity: EntityTypeId },
    PrimaryKeyChanged {
        entity: EntityTypeId,
        previous: Option<KeyId>,
    },

    ForeignKeyAdded(ForeignKeyId),
    ForeignKeyRemoved {
        dependent: EntityTypeId,
        principal: EntityTypeId,
    },
    ForeignKeyPropertiesChanged(ForeignKeyId),
    ForeignKeyUniquenessChanged(ForeignKeyId),

    NavigationAdded(NavigationId),
    NavigationRemoved {
        entity: EntityTypeId,
        name: String,
        foreign_key: ForeignKeyId,
    },

    /// A member was ignored; `foreign_key` is set when it was a navigation
    MemberIgnored {
        entity: EntityTypeId,
        name: String,
        foreign_key: Option<ForeignKeyId>,
    },

    IndexAdded(IndexId),
}

impl ModelEvent {
    /// Short label used in trace output
    pub fn kind(&self) -> &'static str {
        match self {
            ModelEvent::EntityTypeAdded(_) => "entity_type_added",
            ModelEvent::EntityTypeRemoved { .. } => "entity_type_removed",
            ModelEvent::EntityTypeIgnored { .. } => "entity_type_ignored",
            ModelEvent::PropertyAdded(_) => "property_added",
            ModelEvent::PropertyRemoved { .. } => "property_removed",
            ModelEvent::PropertyNullabilityChanged(_) => "property_nullability_changed",
            ModelEvent::KeyAdded(_) => "key_added",
            ModelEvent::KeyRemoved { .. } => "key_removed",
            ModelEvent::PrimaryKeyChanged { .. } => "primary_key_changed",
            ModelEvent::ForeignKeyAdded(_) => "foreign_key_added",
            ModelEvent::ForeignKeyRemoved { .. } => "foreign_key_removed",
            ModelEvent::ForeignKeyPropertiesChanged(_) => "foreign_key_properties_changed",
            ModelEvent::ForeignKeyUniquenessChanged(_) => "foreign_key_uniqueness_changed",
            ModelEvent::NavigationAdded(_) => "navigation_added",
            ModelEvent::NavigationRemoved { .. } => "navigation_removed",
            ModelEvent::MemberIgnored { .. } => "member_ignored",
            ModelEvent::IndexAdded(_) => "index_added",
        }
    }
}
