//! Validation rules for finished models
//!
//! The builder keeps the graph consistent while it is being edited; this
//! module re-checks a finished model end to end before it is handed to a
//! consumer. Rules append diagnostics to a shared report; only error
//! diagnostics fail validation.

use crate::Model;
use modelforge_core::{MetadataError, MetadataResult};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    EmptyEntityName,
    DuplicateEntityName,
    NoPrimaryKey,
    /// An id that resolves to nothing, or to an element of another entity type
    DanglingReference,
    DuplicatePropertyName,
    InvalidShadowIndex,
    NullableNonNullableType,
    EmptyKey,
    NullableKeyProperty,
    ForeignPrimaryKey,
    ForeignKeyCountMismatch,
    ForeignKeyTypeMismatch,
    RequiredWithNullableProperties,
    UnindexedForeignKey,
    NavigationMismatch,
    NavigationNameCollision,
    EmptyIndex,
}

impl DiagnosticCode {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::NoPrimaryKey
            | DiagnosticCode::RequiredWithNullableProperties
            | DiagnosticCode::UnindexedForeignKey => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One finding about one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    /// Display path of the element, e.g. `Order.CustomerId`
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity(), self.path, self.message)
    }
}

// ============================================================================
// ValidationReport
// ============================================================================

/// Diagnostics collected by a validation run, in rule order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, code: DiagnosticCode, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(code, path, message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// Fail with every error joined into one message
    pub fn into_result(self) -> MetadataResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        let message = self
            .errors()
            .map(Diagnostic::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(MetadataError::validation(message))
    }
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait for validation rules
pub trait ValidationRule {
    /// Get the rule name
    fn name(&self) -> &'static str;

    /// Get the rule description
    fn description(&self) -> &'static str;

    /// Append findings about `model` to `report`
    fn check(&self, model: &Model, report: &mut ValidationReport);
}

// ============================================================================
// Validator
// ============================================================================

/// Runs a list of rules over a model
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with default rules
    pub fn with_default_rules() -> Self {
        Self::new()
            .with_rule(EntityTypesRule)
            .with_rule(PropertiesRule)
            .with_rule(KeysRule)
            .with_rule(ForeignKeysRule)
            .with_rule(NavigationsRule)
            .with_rule(IndexesRule)
    }

    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, model: &Model) -> ValidationReport {
        let mut report = ValidationReport::new();
        for rule in &self.rules {
            rule.check(model, &mut report);
        }
        report
    }

    /// Validate, failing on the first error-level finding set
    pub fn validate_result(&self, model: &Model) -> MetadataResult<()> {
        self.validate(model).into_result()
    }
}

// ============================================================================
// Built-in Validation Rules
// ============================================================================

/// Rule: entity type names are non-empty and unique; a missing primary key
/// is only a warning
pub struct EntityTypesRule;

impl ValidationRule for EntityTypesRule {
    fn name(&self) -> &'static str {
        "entity_types"
    }

    fn description(&self) -> &'static str {
        "Entity type names are present and unique"
    }

    fn check(&self, model: &Model, report: &mut ValidationReport) {
        let mut seen = HashSet::new();
        for entity in model.entity_types() {
            let name = entity.name();
            if name.is_empty() {
                report.push(DiagnosticCode::EmptyEntityName, entity.id().to_string(), "empty entity type name");
                continue;
            }
            if !seen.insert(name) {
                report.push(DiagnosticCode::DuplicateEntityName, name, "entity type name used twice");
            }
            if entity.primary_key().is_none() {
                report.push(DiagnosticCode::NoPrimaryKey, name, "no primary key");
            }
        }
    }
}

/// Rule: property names, nullability and shadow indices
pub struct PropertiesRule;

impl ValidationRule for PropertiesRule {
    fn name(&self) -> &'static str {
        "properties"
    }

    fn description(&self) -> &'static str {
        "Property names are unique, nullability fits the type, shadow indices are dense"
    }

    fn check(&self, model: &Model, report: &mut ValidationReport) {
        for entity in model.entity_types() {
            let mut seen = HashSet::new();
            let mut next_shadow = 0;
            for id in entity.properties() {
                let Some(property) = model.property(*id) else {
                    report.push(DiagnosticCode::DanglingReference, entity.name(), format!("property {id} is gone"));
                    continue;
                };
                let path = format!("{}.{}", entity.name(), property.name());

                if !seen.insert(property.name()) {
                    report.push(DiagnosticCode::DuplicatePropertyName, &path, "property name used twice");
                }
                if property.is_nullable() && !property.can_be_nullable() {
                    report.push(
                        DiagnosticCode::NullableNonNullableType,
                        &path,
                        format!("nullable, but '{}' cannot hold null", property.value_type()),
                    );
                }
                let expected = property.is_shadow().then_some(next_shadow);
                if property.is_shadow() {
                    next_shadow += 1;
                }
                if property.shadow_index() != expected {
                    report.push(
                        DiagnosticCode::InvalidShadowIndex,
                        &path,
                        format!("shadow index {:?}, expected {expected:?}", property.shadow_index()),
                    );
                }
            }
        }
    }
}

/// Rule: keys are non-empty, local and non-nullable
pub struct KeysRule;

impl ValidationRule for KeysRule {
    fn name(&self) -> &'static str {
        "keys"
    }

    fn description(&self) -> &'static str {
        "Keys use non-nullable properties of their own entity type"
    }

    fn check(&self, model: &Model, report: &mut ValidationReport) {
        for entity in model.entity_types() {
            if let Some(pk) = entity.primary_key().filter(|pk| !entity.keys().contains(pk)) {
                report.push(
                    DiagnosticCode::ForeignPrimaryKey,
                    entity.name(),
                    format!("primary key {pk} is not one of the entity type's keys"),
                );
            }

            for key in entity.keys().iter().filter_map(|k| model.key(*k)) {
                let path = model.describe_key(key.id());
                if key.properties().is_empty() {
                    report.push(DiagnosticCode::EmptyKey, &path, "key has no properties");
                }
                for property in key.properties() {
                    match model.property(*property) {
                        Some(p) if p.entity() != entity.id() => report.push(
                            DiagnosticCode::DanglingReference,
                            &path,
                            format!("'{}' belongs to another entity type", p.name()),
                        ),
                        Some(p) if p.is_nullable() => report.push(
                            DiagnosticCode::NullableKeyProperty,
                            &path,
                            format!("key property '{}' is nullable", p.name()),
                        ),
                        Some(_) => {}
                        None => report.push(
                            DiagnosticCode::DanglingReference,
                            &path,
                            format!("key property {property} is gone"),
                        ),
                    }
                }
            }
        }
    }
}

/// Rule: foreign keys line up with their principal keys
pub struct ForeignKeysRule;

impl ValidationRule for ForeignKeysRule {
    fn name(&self) -> &'static str {
        "foreign_keys"
    }

    fn description(&self) -> &'static str {
        "Foreign keys match their principal key in count and type"
    }

    fn check(&self, model: &Model, report: &mut ValidationReport) {
        for fk in model.foreign_keys() {
            let path = model.describe_foreign_key(fk.id());
            let Some(key) = model.key(fk.principal_key()) else {
                report.push(DiagnosticCode::DanglingReference, &path, "principal key is gone");
                continue;
            };
            if key.entity() != fk.principal() {
                report.push(
                    DiagnosticCode::DanglingReference,
                    &path,
                    "principal key is declared on another entity type",
                );
            }

            match model.check_foreign_key_shape(fk.dependent(), fk.properties(), fk.principal_key()) {
                Ok(()) => {}
                Err(MetadataError::ForeignKeyCountMismatch { .. }) => report.push(
                    DiagnosticCode::ForeignKeyCountMismatch,
                    &path,
                    "foreign key and principal key property counts differ",
                ),
                Err(err) => report.push(DiagnosticCode::ForeignKeyTypeMismatch, &path, err.to_string()),
            }

            let nullable = fk
                .properties()
                .iter()
                .filter_map(|p| model.property(*p))
                .any(|p| p.is_nullable());
            if fk.is_required() && nullable {
                report.push(
                    DiagnosticCode::RequiredWithNullableProperties,
                    &path,
                    "required relationship over nullable properties",
                );
            }

            let covered = |properties: &[crate::PropertyId]| properties.starts_with(fk.properties());
            let indexed = model.indexes_of(fk.dependent()).any(|i| covered(i.properties()))
                || model.primary_key(fk.dependent()).is_some_and(|k| covered(k.properties()));
            if !indexed {
                report.push(
                    DiagnosticCode::UnindexedForeignKey,
                    &path,
                    "no index starts with the foreign key properties",
                );
            }
        }
    }
}

/// Rule: navigation slots and navigations point at each other
pub struct NavigationsRule;

impl ValidationRule for NavigationsRule {
    fn name(&self) -> &'static str {
        "navigations"
    }

    fn description(&self) -> &'static str {
        "Navigations and foreign key slots reference each other"
    }

    fn check(&self, model: &Model, report: &mut ValidationReport) {
        for entity in model.entity_types() {
            for navigation in model.navigations_of(entity.id()) {
                let path = format!("{}.{}", entity.name(), navigation.name());
                let slot = model
                    .foreign_key(navigation.foreign_key())
                    .and_then(|fk| fk.navigation(navigation.points_to_principal()));
                if slot != Some(navigation.id()) {
                    report.push(DiagnosticCode::NavigationMismatch, &path, "not held by its foreign key");
                }
                if model.find_property(entity.id(), navigation.name()).is_some() {
                    report.push(DiagnosticCode::NavigationNameCollision, &path, "a property has the same name");
                }
            }
        }

        for fk in model.foreign_keys() {
            for to_principal in [true, false] {
                let Some(id) = fk.navigation(to_principal) else {
                    continue;
                };
                let declaring = if to_principal { fk.dependent() } else { fk.principal() };
                let consistent = model.navigation(id).is_some_and(|n| {
                    n.foreign_key() == fk.id()
                        && n.points_to_principal() == to_principal
                        && n.entity() == declaring
                });
                if !consistent {
                    report.push(
                        DiagnosticCode::NavigationMismatch,
                        model.describe_foreign_key(fk.id()),
                        format!("slot holds inconsistent navigation {id}"),
                    );
                }
            }
        }
    }
}

/// Rule: indexes are non-empty and local
pub struct IndexesRule;

impl ValidationRule for IndexesRule {
    fn name(&self) -> &'static str {
        "indexes"
    }

    fn description(&self) -> &'static str {
        "Indexes use properties of their own entity type"
    }

    fn check(&self, model: &Model, report: &mut ValidationReport) {
        for entity in model.entity_types() {
            for index in model.indexes_of(entity.id()) {
                let path = format!("{}({})", entity.name(), model.property_names(index.properties()));
                if index.properties().is_empty() {
                    report.push(DiagnosticCode::EmptyIndex, &path, "index has no properties");
                }
                let foreign = index
                    .properties()
                    .iter()
                    .any(|p| model.property(*p).map_or(true, |p| p.entity() != entity.id()));
                if foreign {
                    report.push(
                        DiagnosticCode::DanglingReference,
                        &path,
                        "index property is not declared on the entity type",
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelforge_core::{ConfigurationSource::*, ValueType};
    use pretty_assertions::assert_eq;

    fn shop() -> Model {
        let mut model = Model::new();
        let customer = model.add_entity_type("Customer", None, Explicit).unwrap();
        let order = model.add_entity_type("Order", None, Explicit).unwrap();
        let id = model.add_property(customer, "Id", ValueType::Int32, true, Explicit).unwrap();
        let order_id = model.add_property(order, "Id", ValueType::Int32, true, Explicit).unwrap();
        let customer_id = model
            .add_property(order, "CustomerId", ValueType::Int32, true, Explicit)
            .unwrap();
        let pk = model.add_key(customer, vec![id], Explicit).unwrap();
        model.set_primary_key(customer, Some(pk), Explicit).unwrap();
        let order_pk = model.add_key(order, vec![order_id], Explicit).unwrap();
        model.set_primary_key(order, Some(order_pk), Explicit).unwrap();
        let fk = model.add_foreign_key(order, vec![customer_id], pk, Explicit).unwrap();
        model.add_navigation(fk, "Customer", true, Explicit).unwrap();
        model.add_index(order, vec![customer_id], Convention).unwrap();
        model
    }

    #[test]
    fn test_warnings_do_not_fail_validation() {
        let mut report = ValidationReport::new();
        report.push(DiagnosticCode::NoPrimaryKey, "Audit", "no primary key");
        assert!(report.is_valid());

        report.push(DiagnosticCode::EmptyKey, "Order(Id)", "key has no properties");
        assert!(!report.is_valid());
        assert_eq!(report.errors().count(), 1);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::new(DiagnosticCode::EmptyKey, "Order(Id)", "key has no properties");
        assert_eq!(diagnostic.to_string(), "error [Order(Id)] key has no properties");
    }

    #[test]
    fn test_valid_model_passes() {
        let report = Validator::with_default_rules().validate(&shop());
        assert!(report.diagnostics().is_empty(), "{:?}", report.diagnostics());
    }

    #[test]
    fn test_missing_primary_key_warns() {
        let mut model = shop();
        model.add_entity_type("Audit", None, Explicit).unwrap();
        let report = Validator::with_default_rules().validate(&model);
        assert!(report.is_valid());
        assert!(report.has(DiagnosticCode::NoPrimaryKey));
    }

    #[test]
    fn test_unindexed_foreign_key_warns() {
        let mut model = shop();
        let order = model.find_entity_type("Order").unwrap().id();
        let index = model.indexes_of(order).next().unwrap().id();
        model.remove_index(index).unwrap();
        let report = Validator::with_default_rules().validate(&model);
        assert!(report.has(DiagnosticCode::UnindexedForeignKey));
    }

    #[test]
    fn test_rule_names() {
        let validator = Validator::with_default_rules();
        assert_eq!(
            validator.rule_names(),
            vec!["entity_types", "properties", "keys", "foreign_keys", "navigations", "indexes"]
        );
    }
}
