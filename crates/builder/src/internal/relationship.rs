//! Relationship resolution
//!
//! A relationship request names the two ends, the navigations on each side
//! and optionally the foreign key and principal key properties. Resolution
//! first looks for an existing foreign key the request describes, in this
//! order:
//!
//! 1. the foreign key the caller already holds
//! 2. a foreign key carrying both requested navigation names
//! 3. the single foreign key whose navigations are compatible with the
//!    requested names
//! 4. a foreign key over exactly the requested properties
//! 5. the single navigation-less foreign key between the two entity types,
//!    when the request names neither navigations nor properties
//!
//! A match in the opposite orientation inverts the existing foreign key when
//! the request fixes the principal end, and otherwise reorients the request.
//! Without a match a new foreign key is created.

use super::InternalModelBuilder;
use crate::events::ModelEvent;
use crate::naming::{
    foreign_key_name_candidates, generate_foreign_key_property_name, normalize, uniquify,
};
use modelforge_core::{ConfigurationSource, MemberKind, MetadataError, MetadataResult, ValueType};
use modelforge_metadata::{EntityTypeId, ForeignKey, ForeignKeyId, KeyId, NavigationId, PropertyId};
use tracing::debug;

// ============================================================================
// Requests
// ============================================================================

/// What a request says about one navigation slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NavigationRequest {
    /// The request leaves the slot as it is
    #[default]
    Unspecified,
    /// The slot must stay empty
    Absent,
    /// The slot holds a navigation of this name
    Named(String),
}

impl NavigationRequest {
    /// `None` means no navigation on that side
    pub fn from_name(name: Option<impl Into<String>>) -> Self {
        match name {
            Some(name) => NavigationRequest::Named(name.into()),
            None => NavigationRequest::Absent,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            NavigationRequest::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, NavigationRequest::Named(_))
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, NavigationRequest::Unspecified)
    }
}

/// Description of a relationship to find or create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRequest {
    pub principal: EntityTypeId,
    pub dependent: EntityTypeId,
    /// Navigation on the dependent pointing at the principal
    pub navigation_to_principal: NavigationRequest,
    /// Navigation on the principal pointing at the dependents
    pub navigation_to_dependent: NavigationRequest,
    pub foreign_key_properties: Option<Vec<String>>,
    pub principal_key_properties: Option<Vec<String>>,
    pub is_unique: Option<bool>,
    pub is_required: Option<bool>,
    /// The caller fixed which end is the principal
    pub principal_end_specified: bool,
    /// Foreign key the caller already holds
    pub existing: Option<ForeignKeyId>,
}

impl RelationshipRequest {
    pub fn new(principal: EntityTypeId, dependent: EntityTypeId) -> Self {
        Self {
            principal,
            dependent,
            navigation_to_principal: NavigationRequest::Unspecified,
            navigation_to_dependent: NavigationRequest::Unspecified,
            foreign_key_properties: None,
            principal_key_properties: None,
            is_unique: None,
            is_required: None,
            principal_end_specified: false,
            existing: None,
        }
    }

    pub fn with_navigation_to_principal(mut self, navigation: NavigationRequest) -> Self {
        self.navigation_to_principal = navigation;
        self
    }

    pub fn with_navigation_to_dependent(mut self, navigation: NavigationRequest) -> Self {
        self.navigation_to_dependent = navigation;
        self
    }

    pub fn with_foreign_key(mut self, properties: Vec<String>) -> Self {
        self.foreign_key_properties = Some(properties);
        self
    }

    pub fn with_principal_key(mut self, properties: Vec<String>) -> Self {
        self.principal_key_properties = Some(properties);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.is_unique = Some(unique);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.is_required = Some(required);
        self
    }

    pub fn with_principal_end(mut self) -> Self {
        self.principal_end_specified = true;
        self
    }

    pub fn for_existing(mut self, foreign_key: ForeignKeyId) -> Self {
        self.existing = Some(foreign_key);
        self
    }

    /// The same request seen from the other end
    ///
    /// Property lists stay as given; callers only invert requests that do
    /// not name foreign key properties.
    pub fn inverted(&self) -> Self {
        Self {
            principal: self.dependent,
            dependent: self.principal,
            navigation_to_principal: self.navigation_to_dependent.clone(),
            navigation_to_dependent: self.navigation_to_principal.clone(),
            ..self.clone()
        }
    }

    fn navigation(&self, to_principal: bool) -> &NavigationRequest {
        if to_principal {
            &self.navigation_to_principal
        } else {
            &self.navigation_to_dependent
        }
    }

    fn navigation_mut(&mut self, to_principal: bool) -> &mut NavigationRequest {
        if to_principal {
            &mut self.navigation_to_principal
        } else {
            &mut self.navigation_to_dependent
        }
    }
}

/// How an existing foreign key relates to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Same(ForeignKeyId),
    Inverted(ForeignKeyId),
    /// Same properties but contradicting uniqueness
    Replace(ForeignKeyId),
}

/// Inputs for discovering or synthesizing foreign key properties
struct DeriveContext<'a> {
    dependent: EntityTypeId,
    principal: EntityTypeId,
    navigation: Option<&'a str>,
    key: KeyId,
    unique: bool,
    exclude: Option<ForeignKeyId>,
}

impl InternalModelBuilder {
    // ========================================================================
    // Entry point
    // ========================================================================

    /// Find, update or create the relationship a request describes
    ///
    /// Returns the foreign key now representing it, which differs from
    /// `request.existing` when the relationship had to be recreated.
    pub fn relationship(
        &mut self,
        request: &RelationshipRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<ForeignKeyId> {
        self.validate_relationship_request(request)?;
        match self.find_matching_relationship(request, source)? {
            Some(Match::Same(fk)) => {
                self.update_relationship(fk, request, source)?;
                Ok(fk)
            }
            Some(Match::Inverted(fk)) if request.principal_end_specified => {
                self.invert_relationship(fk, request, source)
            }
            Some(Match::Inverted(fk)) => {
                self.update_relationship(fk, &request.inverted(), source)?;
                Ok(fk)
            }
            Some(Match::Replace(fk)) => {
                let carried = self.carry_over(fk, request, false);
                debug!(foreign_key = %self.model().describe_foreign_key(fk), "replacing foreign key");
                self.remove_relationship(fk)?;
                self.create_relationship(&carried, source)
            }
            None => self.create_relationship(request, source),
        }
    }

    fn validate_relationship_request(&self, request: &RelationshipRequest) -> MetadataResult<()> {
        let dependent = self.model().require_entity(request.dependent)?;
        self.model().require_entity(request.principal)?;

        if request.principal == request.dependent {
            if let (Some(a), Some(b)) = (
                request.navigation_to_principal.name(),
                request.navigation_to_dependent.name(),
            ) {
                if a == b {
                    return Err(MetadataError::navigation_collision(
                        dependent.name(),
                        a,
                        "both ends of a self-referencing relationship use this name",
                    ));
                }
            }
        }
        let empty = |list: &Option<Vec<String>>| list.as_ref().is_some_and(Vec::is_empty);
        if empty(&request.foreign_key_properties) || empty(&request.principal_key_properties) {
            return Err(MetadataError::validation(format!(
                "empty property list in relationship on '{}'",
                dependent.name()
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Matching
    // ========================================================================

    fn find_matching_relationship(
        &self,
        request: &RelationshipRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<Option<Match>> {
        let matched = |fk: ForeignKeyId, inverted: bool| {
            Some(if inverted {
                Match::Inverted(fk)
            } else {
                Match::Same(fk)
            })
        };

        if let Some(id) = request.existing {
            let fk = self.require_foreign_key(id)?;
            if !fk.connects(request.principal, request.dependent) {
                return Err(MetadataError::internal(format!(
                    "{} does not connect '{}' and '{}'",
                    self.model().describe_foreign_key(id),
                    self.model().entity_name(request.principal),
                    self.model().entity_name(request.dependent)
                )));
            }
            return Ok(matched(id, self.is_inverted(fk, request)));
        }

        let candidates = self.model().foreign_keys_between(request.principal, request.dependent);

        // Both navigation names identify the relationship
        if let (Some(to_principal), Some(to_dependent)) = (
            request.navigation_to_principal.name(),
            request.navigation_to_dependent.name(),
        ) {
            for &fk in &candidates {
                for inverted in [false, true] {
                    if self.is_oriented(fk, request, inverted)
                        && self.navigation_name(fk, !inverted).as_deref() == Some(to_principal)
                        && self.navigation_name(fk, inverted).as_deref() == Some(to_dependent)
                    {
                        return Ok(matched(fk, inverted));
                    }
                }
            }
        }

        // One relationship whose navigations fit the requested names
        if request.navigation_to_principal.is_named() || request.navigation_to_dependent.is_named() {
            let mut compatible = Vec::new();
            for &fk in &candidates {
                for inverted in [false, true] {
                    if !self.is_oriented(fk, request, inverted) {
                        continue;
                    }
                    if let Some(by_name) = self.navigations_compatible(fk, request, inverted, source) {
                        compatible.push((fk, inverted, by_name));
                        break;
                    }
                }
            }
            let by_name: Vec<_> = compatible.iter().filter(|c| c.2).collect();
            let chosen = match (by_name.as_slice(), compatible.as_slice()) {
                ([only], _) => Some(**only),
                ([], [only]) => Some(*only),
                _ => None,
            };
            if let Some((fk, inverted, _)) = chosen {
                return Ok(matched(fk, inverted));
            }
        }

        // Explicit foreign key properties
        if let Some(names) = &request.foreign_key_properties {
            let properties: Option<Vec<PropertyId>> = names
                .iter()
                .map(|n| self.model().find_property(request.dependent, n).map(|p| p.id()))
                .collect();
            let existing = properties.and_then(|properties| {
                self.model().foreign_keys_of(request.dependent).find(|fk| {
                    fk.principal() == request.principal && fk.properties() == properties.as_slice()
                })
            });
            if let Some(fk) = existing {
                return match request.is_unique {
                    Some(unique) if unique != fk.is_unique() => {
                        if ConfigurationSource::can_set(fk.uniqueness_source(), source) {
                            Ok(Some(Match::Replace(fk.id())))
                        } else {
                            Err(MetadataError::conflicting(
                                self.model().describe_foreign_key(fk.id()),
                                "uniqueness was configured by a stronger source",
                            ))
                        }
                    }
                    _ => Ok(Some(Match::Same(fk.id()))),
                };
            }
        }

        // The single unnamed relationship between the two entity types
        if !request.navigation_to_principal.is_named()
            && !request.navigation_to_dependent.is_named()
            && request.foreign_key_properties.is_none()
        {
            let unnamed: Vec<ForeignKeyId> = candidates
                .iter()
                .copied()
                .filter(|fk| {
                    self.is_oriented(*fk, request, false)
                        && self.model().foreign_key(*fk).is_some_and(|f| !f.has_navigations())
                })
                .collect();
            if let [only] = unnamed.as_slice() {
                return Ok(Some(Match::Same(*only)));
            }
        }

        Ok(None)
    }

    /// Check if `fk` runs from the request's dependent to its principal,
    /// or the other way round when `inverted`
    fn is_oriented(&self, fk: ForeignKeyId, request: &RelationshipRequest, inverted: bool) -> bool {
        self.model().foreign_key(fk).is_some_and(|fk| {
            if inverted {
                fk.dependent() == request.principal && fk.principal() == request.dependent
            } else {
                fk.dependent() == request.dependent && fk.principal() == request.principal
            }
        })
    }

    /// Orientation of a held foreign key relative to a request
    ///
    /// Self-referencing foreign keys are told apart by navigation names.
    fn is_inverted(&self, fk: &ForeignKey, request: &RelationshipRequest) -> bool {
        if !fk.is_self_referencing() {
            return fk.dependent() != request.dependent;
        }
        let to_principal = self.navigation_name(fk.id(), true);
        let to_dependent = self.navigation_name(fk.id(), false);
        let requested_principal = request.navigation_to_principal.name();
        let requested_dependent = request.navigation_to_dependent.name();
        (requested_principal.is_some() && requested_principal == to_dependent.as_deref())
            || (requested_dependent.is_some() && requested_dependent == to_principal.as_deref())
    }

    /// Check every requested name against the foreign key's slots
    ///
    /// Returns `None` when a slot holds a different navigation or a stronger
    /// source keeps it empty, otherwise whether any name matched outright.
    fn navigations_compatible(
        &self,
        fk: ForeignKeyId,
        request: &RelationshipRequest,
        inverted: bool,
        source: ConfigurationSource,
    ) -> Option<bool> {
        let foreign_key = self.model().foreign_key(fk)?;
        let mut by_name = false;
        for to_principal in [true, false] {
            let NavigationRequest::Named(name) = request.navigation(to_principal) else {
                continue;
            };
            let slot = to_principal != inverted;
            match self.navigation_name(fk, slot) {
                Some(existing) if existing == *name => by_name = true,
                Some(_) => return None,
                None if foreign_key.can_set_navigation(slot, source) => {}
                None => return None,
            }
        }
        Some(by_name)
    }

    // ========================================================================
    // Inversion
    // ========================================================================

    /// Make the request's principal the principal of `fk`
    fn invert_relationship(
        &mut self,
        fk: ForeignKeyId,
        request: &RelationshipRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<ForeignKeyId> {
        let existing = self.require_foreign_key(fk)?;
        let end = existing.principal_end_source();
        if end == Some(ConfigurationSource::Explicit) || !ConfigurationSource::can_set(end, source) {
            return Err(MetadataError::RelationshipCannotBeInverted {
                principal: self.model().entity_name(existing.principal()),
                dependent: self.model().entity_name(existing.dependent()),
            });
        }

        if existing.is_self_referencing()
            && request.foreign_key_properties.is_none()
            && request.principal_key_properties.is_none()
        {
            self.model_mut().swap_navigation_roles(fk)?;
            self.update_relationship(fk, request, source)?;
            return Ok(fk);
        }

        let carried = self.carry_over(fk, request, true);
        debug!(foreign_key = %self.model().describe_foreign_key(fk), "inverting relationship");
        self.remove_relationship(fk)?;
        self.create_relationship(&carried, source)
    }

    /// Copy what `fk` knows into the parts of `request` it leaves open
    fn carry_over(
        &self,
        fk: ForeignKeyId,
        request: &RelationshipRequest,
        inverted: bool,
    ) -> RelationshipRequest {
        let mut carried = request.clone();
        carried.existing = None;
        let Some(foreign_key) = self.model().foreign_key(fk) else {
            return carried;
        };
        for to_principal in [true, false] {
            let slot = to_principal != inverted;
            if !carried.navigation(to_principal).is_unspecified() {
                continue;
            }
            *carried.navigation_mut(to_principal) = match self.navigation_name(fk, slot) {
                Some(name) => NavigationRequest::Named(name),
                None if foreign_key.navigation_source(slot).is_some() => NavigationRequest::Absent,
                None => NavigationRequest::Unspecified,
            };
        }
        if carried.is_unique.is_none() && foreign_key.uniqueness_source().is_some() {
            carried.is_unique = Some(foreign_key.is_unique());
        }
        carried
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Apply a request to a foreign key of the same orientation
    fn update_relationship(
        &mut self,
        fk: ForeignKeyId,
        request: &RelationshipRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        {
            let foreign_key = self.require_foreign_key_mut(fk)?;
            foreign_key.upgrade_source(source);
            if request.principal_end_specified {
                foreign_key.upgrade_principal_end_source(source);
            }
        }

        self.update_foreign_key_reference(fk, request, source)?;
        if let Some(unique) = request.is_unique {
            self.set_relationship_unique(fk, unique, source)?;
        }
        self.attach_navigation(fk, true, &request.navigation_to_principal, source)?;
        self.attach_navigation(fk, false, &request.navigation_to_dependent, source)?;
        if let Some(required) = request.is_required {
            self.set_relationship_required(fk, required, source)?;
        }
        self.remove_redundant_foreign_keys(fk)
    }

    /// Apply requested principal key and foreign key properties
    ///
    /// A new principal key the current properties cannot reference gets
    /// freshly derived properties, unless a stronger source chose them.
    fn update_foreign_key_reference(
        &mut self,
        fk: ForeignKeyId,
        request: &RelationshipRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let foreign_key = self.require_foreign_key(fk)?;
        let current_key = foreign_key.principal_key();
        let current_properties = foreign_key.properties().to_vec();
        let key_source = foreign_key.principal_key_source();
        let properties_source = foreign_key.properties_source();
        let unique = foreign_key.is_unique();
        let navigation = self.navigation_name(fk, true);

        let requested_key = match &request.principal_key_properties {
            Some(names) => {
                let properties = self.resolve_properties(request.principal, names, source)?;
                Some(self.key_for_properties(request.principal, properties, source)?)
            }
            None => None,
        };
        let key = requested_key.unwrap_or(current_key);
        if key != current_key && !ConfigurationSource::can_set(key_source, source) {
            return Err(MetadataError::conflicting(
                self.model().describe_foreign_key(fk),
                "the principal key was configured by a stronger source",
            ));
        }

        let properties = match &request.foreign_key_properties {
            Some(names) => {
                let properties =
                    self.resolve_foreign_key_properties(request.dependent, names, key, source)?;
                if properties != current_properties
                    && !ConfigurationSource::can_set(properties_source, source)
                {
                    return Err(MetadataError::conflicting(
                        self.model().describe_foreign_key(fk),
                        "the foreign key properties were configured by a stronger source",
                    ));
                }
                properties
            }
            None if key != current_key => {
                let shape = self
                    .model()
                    .check_foreign_key_shape(request.dependent, &current_properties, key);
                match shape {
                    Ok(()) => current_properties,
                    Err(_)
                        if ConfigurationSource::can_set(
                            properties_source,
                            ConfigurationSource::Convention,
                        ) =>
                    {
                        self.derive_foreign_key_properties(&DeriveContext {
                            dependent: request.dependent,
                            principal: request.principal,
                            navigation: navigation.as_deref(),
                            key,
                            unique,
                            exclude: Some(fk),
                        })?
                    }
                    Err(err) => return Err(err),
                }
            }
            None => current_properties,
        };

        self.replace_foreign_key_reference(fk, key, properties)?;
        let foreign_key = self.require_foreign_key_mut(fk)?;
        if requested_key.is_some() {
            foreign_key.upgrade_principal_key_source(source);
        }
        if request.foreign_key_properties.is_some() {
            foreign_key.upgrade_properties_source(source);
        }
        Ok(())
    }

    fn replace_foreign_key_reference(
        &mut self,
        fk: ForeignKeyId,
        key: KeyId,
        properties: Vec<PropertyId>,
    ) -> MetadataResult<()> {
        let foreign_key = self.require_foreign_key(fk)?;
        let current_key = foreign_key.principal_key();
        let previous = foreign_key.properties().to_vec();
        if current_key == key && previous == properties {
            return Ok(());
        }
        if current_key == key {
            self.model_mut().set_foreign_key_properties(fk, properties)?;
        } else {
            self.model_mut().set_foreign_key_reference(fk, key, properties)?;
        }
        self.notify(ModelEvent::ForeignKeyPropertiesChanged(fk));
        self.remove_orphaned_shadow_properties(&previous)
    }

    /// Set uniqueness of a relationship
    pub fn set_relationship_unique(
        &mut self,
        fk: ForeignKeyId,
        unique: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let outcome = self.require_foreign_key_mut(fk)?.set_unique(unique, source);
        if outcome.is_rejected() {
            return Err(MetadataError::conflicting(
                self.model().describe_foreign_key(fk),
                "uniqueness was configured by a stronger source",
            ));
        }
        if outcome.is_updated() {
            self.notify(ModelEvent::ForeignKeyUniquenessChanged(fk));
        }
        Ok(())
    }

    /// Make a relationship required or optional through its properties
    pub fn set_relationship_required(
        &mut self,
        fk: ForeignKeyId,
        required: bool,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let foreign_key = self.require_foreign_key(fk)?;
        if !ConfigurationSource::can_set(foreign_key.required_source(), source) {
            return Err(MetadataError::conflicting(
                self.model().describe_foreign_key(fk),
                "requiredness was configured by a stronger source",
            ));
        }
        let properties = foreign_key.properties().to_vec();
        for property in properties {
            self.set_property_required(property, required, source)?;
        }
        self.require_foreign_key_mut(fk)?.set_required(required, source);
        Ok(())
    }

    // ========================================================================
    // Creation
    // ========================================================================

    fn create_relationship(
        &mut self,
        request: &RelationshipRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<ForeignKeyId> {
        let principal_key = match &request.principal_key_properties {
            Some(names) => {
                let properties = self.resolve_properties(request.principal, names, source)?;
                self.key_for_properties(request.principal, properties, source)?
            }
            None => self
                .model()
                .primary_key(request.principal)
                .map(|k| k.id())
                .ok_or_else(|| {
                    MetadataError::PrincipalKeyNotFound(self.model().entity_name(request.principal))
                })?,
        };

        let (properties, properties_source) = match &request.foreign_key_properties {
            Some(names) => (
                self.resolve_foreign_key_properties(request.dependent, names, principal_key, source)?,
                source,
            ),
            None => (
                self.derive_foreign_key_properties(&DeriveContext {
                    dependent: request.dependent,
                    principal: request.principal,
                    navigation: request.navigation_to_principal.name(),
                    key: principal_key,
                    unique: request.is_unique.unwrap_or(false),
                    exclude: None,
                })?,
                ConfigurationSource::Convention,
            ),
        };

        let id = self
            .model_mut()
            .add_foreign_key(request.dependent, properties, principal_key, source)?;
        {
            let foreign_key = self.require_foreign_key_mut(id)?;
            foreign_key.upgrade_properties_source(properties_source);
            foreign_key.upgrade_principal_key_source(if request.principal_key_properties.is_some() {
                source
            } else {
                ConfigurationSource::Convention
            });
            if request.principal_end_specified {
                foreign_key.upgrade_principal_end_source(source);
            }
        }
        self.notify(ModelEvent::ForeignKeyAdded(id));

        if let Some(unique) = request.is_unique {
            self.set_relationship_unique(id, unique, source)?;
        }
        self.attach_navigation(id, true, &request.navigation_to_principal, source)?;
        self.attach_navigation(id, false, &request.navigation_to_dependent, source)?;
        if let Some(required) = request.is_required {
            self.set_relationship_required(id, required, source)?;
        }
        self.remove_redundant_foreign_keys(id)?;
        Ok(id)
    }

    /// Resolve named foreign key properties against a principal key
    ///
    /// Names with no property or backing member become shadow properties
    /// typed as the nullable counterpart of the matching key property.
    fn resolve_foreign_key_properties(
        &mut self,
        dependent: EntityTypeId,
        names: &[String],
        key: KeyId,
        source: ConfigurationSource,
    ) -> MetadataResult<Vec<PropertyId>> {
        let key_ref = self.model().key(key).ok_or_else(|| MetadataError::KeyNotFound {
            entity: "?".to_string(),
            properties: key.to_string(),
        })?;
        let key_properties = key_ref.properties().to_vec();
        if names.len() != key_properties.len() {
            return Err(MetadataError::ForeignKeyCountMismatch {
                dependent: self.model().entity_name(dependent),
                dependent_properties: names.join(", "),
                principal: self.model().entity_name(key_ref.entity()),
                principal_properties: self.model().property_names(&key_properties),
            });
        }

        let mut properties = Vec::with_capacity(names.len());
        for (name, key_property) in names.iter().zip(&key_properties) {
            let id = match self.property(dependent, name, None, source) {
                Ok(id) => id,
                Err(MetadataError::PropertyNotFound { .. }) => {
                    let value_type = self.require_property(*key_property)?.value_type().to_nullable();
                    self.property(dependent, name, Some(&value_type), source)?
                }
                Err(err) => return Err(err),
            };
            properties.push(id);
        }
        self.model().check_foreign_key_shape(dependent, &properties, key)?;
        Ok(properties)
    }

    fn derive_foreign_key_properties(
        &mut self,
        context: &DeriveContext<'_>,
    ) -> MetadataResult<Vec<PropertyId>> {
        if let Some(found) = self.match_foreign_key_properties(context) {
            return Ok(found);
        }
        self.create_shadow_foreign_key_properties(context)
    }

    /// Find dependent properties named after the navigation or principal
    fn match_foreign_key_properties(&self, context: &DeriveContext<'_>) -> Option<Vec<PropertyId>> {
        let model = self.model();
        let key = model.key(context.key)?;
        let principal_name = model.entity_type(context.principal)?.short_name().to_string();
        let mut prefixes: Vec<&str> = context.navigation.into_iter().collect();
        prefixes.push(&principal_name);

        let mut found: Vec<PropertyId> = Vec::new();
        for key_property in key.properties() {
            let key_property = model.property(*key_property)?;
            let candidates = foreign_key_name_candidates(&prefixes, key_property.name());
            let matched = model.properties_of(context.dependent).find(|p| {
                candidates.contains(&normalize(p.name()))
                    && p.value_type().is_compatible_with(key_property.value_type())
                    && !found.contains(&p.id())
            })?;
            found.push(matched.id());
        }

        if context.dependent == context.principal && key.properties() == found.as_slice() {
            return None;
        }
        let is_primary_key = model
            .primary_key(context.dependent)
            .is_some_and(|pk| pk.properties() == found.as_slice());
        if is_primary_key && !context.unique {
            return None;
        }
        let taken = model.foreign_keys_of(context.dependent).any(|fk| {
            Some(fk.id()) != context.exclude
                && fk.principal() == context.principal
                && fk.properties() == found.as_slice()
        });
        (!taken).then_some(found)
    }

    /// Create `<Navigation|Principal><KeyProperty>` shadow properties
    fn create_shadow_foreign_key_properties(
        &mut self,
        context: &DeriveContext<'_>,
    ) -> MetadataResult<Vec<PropertyId>> {
        let key_properties: Vec<(String, ValueType)> = self
            .model()
            .key(context.key)
            .map(|k| k.properties().to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| self.model().property(p))
            .map(|p| (p.name().to_string(), p.value_type().clone()))
            .collect();
        let prefix = match context.navigation {
            Some(navigation) => navigation.to_string(),
            None => self
                .model()
                .require_entity(context.principal)?
                .short_name()
                .to_string(),
        };
        let style = self.config().naming;

        let mut properties = Vec::with_capacity(key_properties.len());
        for (key_name, key_type) in key_properties {
            let base = generate_foreign_key_property_name(style, &prefix, &key_name);
            let name = {
                let entity = self.model().require_entity(context.dependent)?;
                let clr_type = entity.clr_type();
                uniquify(&base, |candidate| {
                    self.model().find_property(context.dependent, candidate).is_some()
                        || self.model().find_navigation(context.dependent, candidate).is_some()
                        || entity.is_ignored(candidate)
                        || clr_type
                            .is_some_and(|t| self.accessor().find_member(t, candidate).is_some())
                })
            };
            debug!(
                entity = %self.model().entity_name(context.dependent),
                property = %name,
                "creating shadow foreign key property"
            );
            let id = self.property(
                context.dependent,
                &name,
                Some(&key_type.to_nullable()),
                ConfigurationSource::Convention,
            )?;
            properties.push(id);
        }
        Ok(properties)
    }

    // ========================================================================
    // Navigations
    // ========================================================================

    /// Bring one navigation slot in line with a request
    ///
    /// A navigation of the same name held by another relationship moves to
    /// this one when its source allows; a convention relationship left with
    /// no navigations is removed.
    fn attach_navigation(
        &mut self,
        fk: ForeignKeyId,
        to_principal: bool,
        request: &NavigationRequest,
        source: ConfigurationSource,
    ) -> MetadataResult<()> {
        let foreign_key = self.require_foreign_key(fk)?;
        let current = foreign_key.navigation(to_principal);
        let can_set = foreign_key.can_set_navigation(to_principal, source);
        let slot_source = foreign_key.navigation_source(to_principal);
        let entity = if to_principal {
            foreign_key.dependent()
        } else {
            foreign_key.principal()
        };
        let entity_name = self.model().entity_name(entity);

        let name = match request {
            NavigationRequest::Unspecified => return Ok(()),
            NavigationRequest::Absent => {
                if let Some(navigation) = current {
                    if !can_set {
                        return Err(slot_conflict(&entity_name, &self.navigation_label(navigation), slot_source));
                    }
                    self.remove_navigation(navigation)?;
                }
                if can_set {
                    self.require_foreign_key_mut(fk)?
                        .upgrade_navigation_source(to_principal, source);
                }
                return Ok(());
            }
            NavigationRequest::Named(name) => name,
        };

        if let Some(navigation) = current {
            if self.navigation_label(navigation) == *name {
                if let Some(navigation) = self.model_mut().navigation_mut(navigation) {
                    navigation.upgrade_source(source);
                }
                self.require_foreign_key_mut(fk)?
                    .upgrade_navigation_source(to_principal, source);
                return Ok(());
            }
        }
        if !can_set {
            return Err(slot_conflict(&entity_name, name, slot_source));
        }

        self.check_member_not_ignored(entity, name, source)?;
        let clr_type = self
            .model()
            .entity_type(entity)
            .and_then(|e| e.clr_type())
            .map(str::to_string);
        if let Some(member) = clr_type.and_then(|t| self.accessor().find_member(&t, name)) {
            if matches!(member.kind, MemberKind::Scalar(_)) {
                return Err(MetadataError::navigation_collision(
                    entity_name,
                    name.as_str(),
                    "the backing member is a scalar property",
                ));
            }
        }

        let other = self
            .model()
            .find_navigation(entity, name)
            .map(|n| (n.id(), n.foreign_key(), n.configuration_source()));
        if let Some((other, other_fk, other_source)) = other {
            if other_fk == fk || other_source > source {
                return Err(MetadataError::navigation_collision(
                    entity_name,
                    name.as_str(),
                    "the name is used by another relationship",
                ));
            }
            self.remove_navigation(other)?;
            let abandoned = self.model().foreign_key(other_fk).is_some_and(|f| {
                f.configuration_source() == ConfigurationSource::Convention && !f.has_navigations()
            });
            if abandoned {
                self.remove_relationship(other_fk)?;
            }
        }

        if let Some(navigation) = current {
            self.remove_navigation(navigation)?;
        }
        let id = self
            .model_mut()
            .add_navigation(fk, name.clone(), to_principal, source)?;
        self.notify(ModelEvent::NavigationAdded(id));
        Ok(())
    }

    pub fn remove_navigation(&mut self, id: NavigationId) -> MetadataResult<()> {
        let removed = self.model_mut().remove_navigation(id)?;
        self.notify(ModelEvent::NavigationRemoved {
            entity: removed.entity(),
            name: removed.name().to_string(),
            foreign_key: removed.foreign_key(),
        });
        Ok(())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a relationship with its navigations
    ///
    /// Shadow properties the convention created for it go too.
    pub fn remove_relationship(&mut self, fk: ForeignKeyId) -> MetadataResult<()> {
        let foreign_key = self.require_foreign_key(fk)?;
        let dependent = foreign_key.dependent();
        let principal = foreign_key.principal();
        let properties = foreign_key.properties().to_vec();
        let navigations: Vec<NavigationId> = foreign_key.navigations().collect();
        debug!(foreign_key = %self.model().describe_foreign_key(fk), "removing relationship");

        for navigation in navigations {
            self.remove_navigation(navigation)?;
        }
        self.model_mut().remove_foreign_key(fk)?;
        self.notify(ModelEvent::ForeignKeyRemoved { dependent, principal });
        self.remove_orphaned_shadow_properties(&properties)
    }

    /// Remove convention shadow properties no key or foreign key uses
    fn remove_orphaned_shadow_properties(&mut self, properties: &[PropertyId]) -> MetadataResult<()> {
        for &id in properties {
            let Some(property) = self.model().property(id) else {
                continue;
            };
            if !property.is_shadow() || property.configuration_source() != ConfigurationSource::Convention {
                continue;
            }
            let model = self.model();
            if !model.keys_containing(id).is_empty() || !model.foreign_keys_containing(id).is_empty() {
                continue;
            }
            let indexes = model.indexes_containing(id);
            let configured_index = indexes.iter().any(|i| {
                model
                    .index(*i)
                    .is_some_and(|i| i.configuration_source() != ConfigurationSource::Convention)
            });
            if configured_index {
                continue;
            }
            let entity = property.entity();
            for index in indexes {
                self.model_mut().remove_index(index)?;
            }
            let removed = self.model_mut().remove_property(id)?;
            self.notify(ModelEvent::PropertyRemoved {
                entity,
                name: removed.name().to_string(),
            });
        }
        Ok(())
    }

    /// Remove navigation-less convention foreign keys duplicating `fk`
    fn remove_redundant_foreign_keys(&mut self, fk: ForeignKeyId) -> MetadataResult<()> {
        let foreign_key = self.require_foreign_key(fk)?;
        let redundant: Vec<ForeignKeyId> = self
            .model()
            .foreign_keys_of(foreign_key.dependent())
            .filter(|other| {
                other.id() != fk
                    && other.properties() == foreign_key.properties()
                    && other.principal_key() == foreign_key.principal_key()
                    && !other.has_navigations()
                    && other.configuration_source() == ConfigurationSource::Convention
            })
            .map(|other| other.id())
            .collect();
        for other in redundant {
            self.remove_relationship(other)?;
        }
        Ok(())
    }

    // ========================================================================
    // Rediscovery
    // ========================================================================

    /// Swap convention shadow properties for dependent properties that now
    /// match by name
    ///
    /// Returns `true` when the foreign key properties changed.
    pub(crate) fn rediscover_foreign_key_properties(
        &mut self,
        fk: ForeignKeyId,
    ) -> MetadataResult<bool> {
        let foreign_key = self.require_foreign_key(fk)?;
        if !ConfigurationSource::can_set(
            foreign_key.properties_source(),
            ConfigurationSource::Convention,
        ) {
            return Ok(false);
        }
        let current = foreign_key.properties().to_vec();
        let (dependent, principal) = (foreign_key.dependent(), foreign_key.principal());
        let (key, unique) = (foreign_key.principal_key(), foreign_key.is_unique());
        if !self.all_shadow(&current) {
            return Ok(false);
        }

        let navigation = self.navigation_name(fk, true);
        let found = self.match_foreign_key_properties(&DeriveContext {
            dependent,
            principal,
            navigation: navigation.as_deref(),
            key,
            unique,
            exclude: Some(fk),
        });
        match found {
            Some(found) if found != current => {
                self.replace_foreign_key_reference(fk, key, found)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Flip a one-to-one whose principal end was never fixed when only the
    /// principal carries properties matching the other side's key
    ///
    /// Returns the foreign key that replaced `fk`.
    pub(crate) fn reorient_one_to_one(
        &mut self,
        fk: ForeignKeyId,
    ) -> MetadataResult<Option<ForeignKeyId>> {
        let foreign_key = self.require_foreign_key(fk)?;
        if !foreign_key.is_unique()
            || foreign_key.configuration_source() != ConfigurationSource::Convention
            || foreign_key.is_self_referencing()
            || foreign_key.principal_end_source().is_some()
            || !ConfigurationSource::can_set(
                foreign_key.properties_source(),
                ConfigurationSource::Convention,
            )
        {
            return Ok(None);
        }
        let (dependent, principal) = (foreign_key.dependent(), foreign_key.principal());
        let current = foreign_key.properties().to_vec();
        if !self.all_shadow(&current) {
            return Ok(None);
        }
        let Some(inverse_key) = self.model().primary_key(dependent).map(|k| k.id()) else {
            return Ok(None);
        };

        let navigation = self.navigation_name(fk, false);
        let found = self.match_foreign_key_properties(&DeriveContext {
            dependent: principal,
            principal: dependent,
            navigation: navigation.as_deref(),
            key: inverse_key,
            unique: true,
            exclude: None,
        });
        if found.is_none() {
            return Ok(None);
        }
        let request = RelationshipRequest::new(dependent, principal)
            .unique(true)
            .with_principal_end()
            .for_existing(fk);
        self.relationship(&request, ConfigurationSource::Convention)
            .map(Some)
    }

    fn all_shadow(&self, properties: &[PropertyId]) -> bool {
        properties
            .iter()
            .all(|p| self.model().property(*p).is_some_and(|p| p.is_shadow()))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn require_foreign_key(&self, id: ForeignKeyId) -> MetadataResult<&ForeignKey> {
        self.model()
            .foreign_key(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))
    }

    fn require_foreign_key_mut(&mut self, id: ForeignKeyId) -> MetadataResult<&mut ForeignKey> {
        self.model_mut()
            .foreign_key_mut(id)
            .ok_or_else(|| MetadataError::ForeignKeyNotFound(id.to_string()))
    }

    /// Name of the navigation in one slot of a foreign key
    pub(crate) fn navigation_name(&self, fk: ForeignKeyId, to_principal: bool) -> Option<String> {
        let navigation = self.model().foreign_key(fk)?.navigation(to_principal)?;
        self.model().navigation(navigation).map(|n| n.name().to_string())
    }

    fn navigation_label(&self, id: NavigationId) -> String {
        self.model()
            .navigation(id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

fn slot_conflict(
    entity: &str,
    navigation: &str,
    slot_source: Option<ConfigurationSource>,
) -> MetadataError {
    MetadataError::conflicting(
        format!("{entity}.{navigation}"),
        format!(
            "the navigation slot was configured at {}",
            slot_source.map(|s| s.display_name()).unwrap_or("?")
        ),
    )
}
