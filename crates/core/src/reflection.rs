//! Member discovery over backing types
//!
//! The builder never inspects runtime types directly. It asks a
//! [`MemberAccessor`] for the members of a named type; [`TypeRegistry`] is the
//! in-memory implementation used by applications and tests, and
//! [`CachedMemberAccessor`] memoizes lookups for the lifetime of a builder.

use crate::types::ValueType;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

// ============================================================================
// Members
// ============================================================================

/// What a member holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum MemberKind {
    /// A scalar value
    Scalar(ValueType),
    /// A reference to a single instance of the named type
    Reference(String),
    /// A collection of instances of the named type
    Collection(String),
}

/// Attribute attached to a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberAttribute {
    Key,
    Required,
    MaxLength(usize),
    ConcurrencyCheck,
    NotMapped,
}

/// A member of a backing type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    #[serde(default)]
    pub attributes: Vec<MemberAttribute>,
}

impl MemberInfo {
    /// Create a scalar member
    pub fn scalar(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Scalar(value_type),
            attributes: Vec::new(),
        }
    }

    /// Create a reference navigation member
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Reference(target.into()),
            attributes: Vec::new(),
        }
    }

    /// Create a collection navigation member
    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Collection(target.into()),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, attribute: MemberAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Check if this member points at another type
    pub fn is_navigation(&self) -> bool {
        !matches!(self.kind, MemberKind::Scalar(_))
    }

    /// Check if this member is a collection
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, MemberKind::Collection(_))
    }

    /// Get the type a navigation member points at
    pub fn target_type(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Reference(target) | MemberKind::Collection(target) => Some(target),
            MemberKind::Scalar(_) => None,
        }
    }

    /// Get the value type of a scalar member
    pub fn value_type(&self) -> Option<&ValueType> {
        match &self.kind {
            MemberKind::Scalar(value_type) => Some(value_type),
            _ => None,
        }
    }

    /// Check if the member carries an attribute
    pub fn has_attribute(&self, attribute: &MemberAttribute) -> bool {
        self.attributes.contains(attribute)
    }

    /// Get the declared maximum length, if any
    pub fn max_length(&self) -> Option<usize> {
        self.attributes.iter().find_map(|a| match a {
            MemberAttribute::MaxLength(len) => Some(*len),
            _ => None,
        })
    }
}

// ============================================================================
// Type Descriptors
// ============================================================================

/// Description of a backing type and its members, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberInfo>,
}

impl TypeDescriptor {
    /// Create an empty descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a scalar member
    pub fn scalar(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.with_member(MemberInfo::scalar(name, value_type))
    }

    /// Add a reference navigation member
    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_member(MemberInfo::reference(name, target))
    }

    /// Add a collection navigation member
    pub fn collection(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_member(MemberInfo::collection(name, target))
    }

    /// Add a member
    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

/// Source of member information for named types
pub trait MemberAccessor {
    /// Get the members of a type, or `None` if the type is unknown
    fn members(&self, type_name: &str) -> Option<Vec<MemberInfo>>;
}

/// In-memory accessor backed by type descriptors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    /// Register a descriptor (builder style)
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Get a registered descriptor
    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl MemberAccessor for TypeRegistry {
    fn members(&self, type_name: &str) -> Option<Vec<MemberInfo>> {
        self.types.get(type_name).map(|t| t.members.clone())
    }
}

type MemberCache = HashMap<String, Option<Rc<[MemberInfo]>>>;

/// Accessor wrapper that caches member lists per type
///
/// Lookups are cached for the lifetime of the wrapper, including misses.
pub struct CachedMemberAccessor {
    inner: Box<dyn MemberAccessor>,
    cache: RefCell<MemberCache>,
}

impl CachedMemberAccessor {
    /// Wrap an accessor
    pub fn new(inner: impl MemberAccessor + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Get the members of a type
    pub fn members(&self, type_name: &str) -> Option<Rc<[MemberInfo]>> {
        if let Some(cached) = self.cache.borrow().get(type_name) {
            return cached.clone();
        }
        let members: Option<Rc<[MemberInfo]>> = self.inner.members(type_name).map(Rc::from);
        self.cache
            .borrow_mut()
            .insert(type_name.to_string(), members.clone());
        members
    }

    /// Find a member by name
    pub fn find_member(&self, type_name: &str, member: &str) -> Option<MemberInfo> {
        self.members(type_name)?
            .iter()
            .find(|m| m.name == member)
            .cloned()
    }

    /// Check if the type is known to the accessor
    pub fn has_type(&self, type_name: &str) -> bool {
        self.members(type_name).is_some()
    }

    /// Drop every cached lookup
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl std::fmt::Debug for CachedMemberAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedMemberAccessor")
            .field("cached_types", &self.cache.borrow().len())
            .finish()
    }
}

/// Short name of a possibly namespaced type name
///
/// `Shop.Orders.Customer` and `shop::orders::Customer` both become `Customer`.
pub fn short_name(full: &str) -> &str {
    let after_path = full.rsplit("::").next().unwrap_or(full);
    after_path.rsplit('.').next().unwrap_or(after_path)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(
                TypeDescriptor::new("Customer")
                    .scalar("Id", ValueType::Int32)
                    .scalar("Name", ValueType::String)
                    .collection("Orders", "Order"),
            )
            .with_type(
                TypeDescriptor::new("Order")
                    .scalar("Id", ValueType::Int32)
                    .reference("Customer", "Customer"),
            )
    }

    #[test]
    fn test_member_info_kinds() {
        let member = MemberInfo::reference("Customer", "Customer");
        assert!(member.is_navigation());
        assert!(!member.is_collection());
        assert_eq!(member.target_type(), Some("Customer"));
        assert_eq!(member.value_type(), None);

        let member = MemberInfo::scalar("Name", ValueType::String)
            .with_attribute(MemberAttribute::MaxLength(64));
        assert!(!member.is_navigation());
        assert_eq!(member.max_length(), Some(64));
        assert!(!member.has_attribute(&MemberAttribute::Required));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        let members = registry.members("Customer").unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[2].name, "Orders");
        assert!(registry.members("Unknown").is_none());
    }

    struct CountingAccessor {
        calls: Rc<Cell<usize>>,
        registry: TypeRegistry,
    }

    impl MemberAccessor for CountingAccessor {
        fn members(&self, type_name: &str) -> Option<Vec<MemberInfo>> {
            self.calls.set(self.calls.get() + 1);
            self.registry.members(type_name)
        }
    }

    #[test]
    fn test_cached_accessor_memoizes() {
        let calls = Rc::new(Cell::new(0));
        let accessor = CachedMemberAccessor::new(CountingAccessor {
            calls: calls.clone(),
            registry: registry(),
        });

        assert!(accessor.has_type("Order"));
        assert!(accessor.find_member("Order", "Customer").is_some());
        assert!(accessor.find_member("Order", "Missing").is_none());
        assert_eq!(calls.get(), 1);

        assert!(!accessor.has_type("Ghost"));
        assert!(!accessor.has_type("Ghost"));
        assert_eq!(calls.get(), 2);

        accessor.clear();
        assert!(accessor.has_type("Order"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("Shop.Orders.Customer"), "Customer");
        assert_eq!(short_name("shop::orders::Customer"), "Customer");
        assert_eq!(short_name("Customer"), "Customer");
    }
}
