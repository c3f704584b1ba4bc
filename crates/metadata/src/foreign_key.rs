//! Foreign keys and navigations
//!
//! A foreign key is the relationship: dependent properties referencing a
//! principal key, plus up to two navigations. Each navigation slot keeps its
//! own configuration source so that an explicit "no navigation here" survives
//! later convention passes.

use crate::arena::{EntityTypeId, ForeignKeyId, KeyId, NavigationId, PropertyId};
use modelforge_core::{Annotations, ConfigurationSource, Configured, SetOutcome};

// ============================================================================
// ForeignKey
// ============================================================================

/// Dependent properties referencing a principal key
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub(crate) id: ForeignKeyId,

    /// Declaring entity type
    pub(crate) dependent: EntityTypeId,

    /// Entity type owning the principal key
    pub(crate) principal: EntityTypeId,
    pub(crate) principal_key: KeyId,

    /// Dependent properties, aligned with the principal key properties
    pub(crate) properties: Vec<PropertyId>,

    pub(crate) is_unique: Configured<bool>,
    pub(crate) is_required: Configured<bool>,

    pub(crate) navigation_to_principal: Configured<Option<NavigationId>>,
    pub(crate) navigation_to_dependent: Configured<Option<NavigationId>>,

    pub(crate) configuration_source: ConfigurationSource,
    pub(crate) properties_source: Option<ConfigurationSource>,
    pub(crate) principal_key_source: Option<ConfigurationSource>,
    pub(crate) principal_end_source: Option<ConfigurationSource>,

    pub(crate) annotations: Annotations,
}

impl ForeignKey {
    pub(crate) fn new(
        id: ForeignKeyId,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        principal_key: KeyId,
        properties: Vec<PropertyId>,
        required: bool,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            id,
            dependent,
            principal,
            principal_key,
            properties,
            is_unique: Configured::new(false),
            is_required: Configured::new(required),
            navigation_to_principal: Configured::new(None),
            navigation_to_dependent: Configured::new(None),
            configuration_source: source,
            properties_source: None,
            principal_key_source: None,
            principal_end_source: None,
            annotations: Annotations::new(),
        }
    }

    pub fn id(&self) -> ForeignKeyId {
        self.id
    }

    pub fn dependent(&self) -> EntityTypeId {
        self.dependent
    }

    pub fn principal(&self) -> EntityTypeId {
        self.principal
    }

    pub fn principal_key(&self) -> KeyId {
        self.principal_key
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn is_self_referencing(&self) -> bool {
        self.dependent == self.principal
    }

    /// Check if the relationship connects `a` and `b` in either orientation
    pub fn connects(&self, a: EntityTypeId, b: EntityTypeId) -> bool {
        (self.dependent == a && self.principal == b) || (self.dependent == b && self.principal == a)
    }

    // ========================================================================
    // Sources
    // ========================================================================

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.configuration_source
    }

    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.configuration_source = source.max(Some(self.configuration_source));
    }

    pub fn properties_source(&self) -> Option<ConfigurationSource> {
        self.properties_source
    }

    pub fn upgrade_properties_source(&mut self, source: ConfigurationSource) {
        self.properties_source = Some(source.max(self.properties_source));
    }

    pub fn principal_key_source(&self) -> Option<ConfigurationSource> {
        self.principal_key_source
    }

    pub fn upgrade_principal_key_source(&mut self, source: ConfigurationSource) {
        self.principal_key_source = Some(source.max(self.principal_key_source));
    }

    pub fn principal_end_source(&self) -> Option<ConfigurationSource> {
        self.principal_end_source
    }

    pub fn upgrade_principal_end_source(&mut self, source: ConfigurationSource) {
        self.principal_end_source = Some(source.max(self.principal_end_source));
    }

    // ========================================================================
    // Uniqueness and requiredness
    // ========================================================================

    pub fn is_unique(&self) -> bool {
        *self.is_unique.get()
    }

    pub fn uniqueness_source(&self) -> Option<ConfigurationSource> {
        self.is_unique.source()
    }

    pub fn set_unique(&mut self, unique: bool, source: ConfigurationSource) -> SetOutcome {
        self.is_unique.try_set(unique, source)
    }

    pub fn is_required(&self) -> bool {
        *self.is_required.get()
    }

    pub fn required_source(&self) -> Option<ConfigurationSource> {
        self.is_required.source()
    }

    pub fn set_required(&mut self, required: bool, source: ConfigurationSource) -> SetOutcome {
        self.is_required.try_set(required, source)
    }

    // ========================================================================
    // Navigation slots
    // ========================================================================

    pub fn navigation_to_principal(&self) -> Option<NavigationId> {
        *self.navigation_to_principal.get()
    }

    pub fn navigation_to_dependent(&self) -> Option<NavigationId> {
        *self.navigation_to_dependent.get()
    }

    /// Navigation in the given slot
    pub fn navigation(&self, to_principal: bool) -> Option<NavigationId> {
        if to_principal {
            self.navigation_to_principal()
        } else {
            self.navigation_to_dependent()
        }
    }

    /// Source that last configured the given slot
    pub fn navigation_source(&self, to_principal: bool) -> Option<ConfigurationSource> {
        self.slot(to_principal).source()
    }

    /// Check if `source` may change the given slot
    pub fn can_set_navigation(&self, to_principal: bool, source: ConfigurationSource) -> bool {
        self.slot(to_principal).can_set(source)
    }

    /// Record that the slot was configured without changing its content
    pub fn upgrade_navigation_source(&mut self, to_principal: bool, source: ConfigurationSource) {
        self.slot_mut(to_principal).upgrade_source(source);
    }

    pub fn navigations(&self) -> impl Iterator<Item = NavigationId> + '_ {
        self.navigation_to_principal()
            .into_iter()
            .chain(self.navigation_to_dependent())
    }

    pub fn has_navigations(&self) -> bool {
        self.navigations().next().is_some()
    }

    pub(crate) fn slot(&self, to_principal: bool) -> &Configured<Option<NavigationId>> {
        if to_principal {
            &self.navigation_to_principal
        } else {
            &self.navigation_to_dependent
        }
    }

    pub(crate) fn slot_mut(&mut self, to_principal: bool) -> &mut Configured<Option<NavigationId>> {
        if to_principal {
            &mut self.navigation_to_principal
        } else {
            &mut self.navigation_to_dependent
        }
    }
}

crate::impl_annotatable!(ForeignKey);

// ============================================================================
// Navigation
// ============================================================================

/// A named member traversing a foreign key
#[derive(Debug, Clone)]
pub struct Navigation {
    pub(crate) id: NavigationId,

    /// Declaring entity type: the dependent for a navigation to the principal,
    /// the principal otherwise
    pub(crate) entity: EntityTypeId,
    pub(crate) name: String,
    pub(crate) foreign_key: ForeignKeyId,
    pub(crate) points_to_principal: bool,
    pub(crate) configuration_source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Navigation {
    pub fn id(&self) -> NavigationId {
        self.id
    }

    pub fn entity(&self) -> EntityTypeId {
        self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn foreign_key(&self) -> ForeignKeyId {
        self.foreign_key
    }

    pub fn points_to_principal(&self) -> bool {
        self.points_to_principal
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.configuration_source
    }

    pub fn upgrade_source(&mut self, source: ConfigurationSource) {
        self.configuration_source = source.max(Some(self.configuration_source));
    }
}

crate::impl_annotatable!(Navigation);

// ============================================================================
// Tests
// ============================================================================
