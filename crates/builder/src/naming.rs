//! Naming helpers for discovered keys and foreign key properties
//!
//! Matching is case- and style-insensitive: `CustomerId`, `customerId`,
//! `customer_id` and `CUSTOMER_ID` all name the same thing.

use crate::config::NamingStyle;
use heck::ToSnakeCase;

// ============================================================================
// Matching
// ============================================================================

/// Style-insensitive form of a name
///
/// # Examples
///
/// - "CustomerId" -> "customerid"
/// - "customer_id" -> "customerid"
pub fn normalize(name: &str) -> String {
    name.to_snake_case().replace('_', "")
}

/// Check if two names are the same ignoring case and word separators
pub fn names_match(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Check if a property name marks a key: `<suffix>` or `<Type><suffix>`
pub fn is_key_property_name(entity_short_name: &str, property: &str, suffix: &str) -> bool {
    let property = normalize(property);
    property == normalize(suffix) || property == normalize(&format!("{entity_short_name}{suffix}"))
}

// ============================================================================
// Foreign key property names
// ============================================================================

/// Normalized names a dependent property may carry to match `key_property`
///
/// For each prefix (navigation name, then principal type name) this yields
/// `<prefix><key_property>`, plus `<key_property>` alone when it already
/// starts with the prefix.
pub fn foreign_key_name_candidates(prefixes: &[&str], key_property: &str) -> Vec<String> {
    let key = normalize(key_property);
    let mut candidates = Vec::new();
    for prefix in prefixes {
        let prefix = normalize(prefix);
        if prefix.is_empty() {
            continue;
        }
        let combined = format!("{prefix}{key}");
        if !candidates.contains(&combined) {
            candidates.push(combined);
        }
        if key.starts_with(&prefix) && !candidates.contains(&key) {
            candidates.push(key.clone());
        }
    }
    candidates
}

/// Generate a foreign key property name in the configured style
///
/// # Examples
///
/// - (Pascal, "Customer", "Id") -> "CustomerId"
/// - (Snake, "BlogPost", "Id") -> "blog_post_id"
/// - (Pascal, "Customer", "CustomerId") -> "CustomerId"
pub fn generate_foreign_key_property_name(
    style: NamingStyle,
    prefix: &str,
    key_property: &str,
) -> String {
    let already_prefixed = normalize(key_property).starts_with(&normalize(prefix));
    match style {
        NamingStyle::Pascal if already_prefixed => key_property.to_string(),
        NamingStyle::Pascal => format!("{}{}", capitalize(prefix), capitalize(key_property)),
        NamingStyle::Snake if already_prefixed => key_property.to_snake_case(),
        NamingStyle::Snake => format!("{}_{}", prefix.to_snake_case(), key_property.to_snake_case()),
    }
}

/// Append the smallest counter that makes `base` unused
///
/// # Examples
///
/// - "CustomerId" with nothing taken -> "CustomerId"
/// - "CustomerId" with "CustomerId" taken -> "CustomerId1"
pub fn uniquify(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Capitalize the first letter of a string
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("CustomerId"), "customerid");
        assert_eq!(normalize("customer_id"), "customerid");
        assert_eq!(normalize("CUSTOMER_ID"), "customerid");
        assert!(names_match("BlogPostId", "blog_post_id"));
        assert!(!names_match("BlogId", "PostId"));
    }

    #[test]
    fn test_is_key_property_name() {
        assert!(is_key_property_name("Customer", "Id", "Id"));
        assert!(is_key_property_name("Customer", "CustomerId", "Id"));
        assert!(is_key_property_name("Customer", "customer_id", "Id"));
        assert!(!is_key_property_name("Customer", "OrderId", "Id"));
        assert!(is_key_property_name("Customer", "CustomerKey", "Key"));
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            foreign_key_name_candidates(&["Owner", "Customer"], "Id"),
            vec!["ownerid".to_string(), "customerid".to_string()]
        );
        assert_eq!(
            foreign_key_name_candidates(&["Customer"], "CustomerId"),
            vec!["customercustomerid".to_string(), "customerid".to_string()]
        );
    }

    #[test]
    fn test_generate_foreign_key_property_name() {
        assert_eq!(
            generate_foreign_key_property_name(NamingStyle::Pascal, "Customer", "Id"),
            "CustomerId"
        );
        assert_eq!(
            generate_foreign_key_property_name(NamingStyle::Snake, "BlogPost", "Id"),
            "blog_post_id"
        );
        assert_eq!(
            generate_foreign_key_property_name(NamingStyle::Pascal, "Customer", "CustomerId"),
            "CustomerId"
        );
    }

    #[test]
    fn test_uniquify() {
        let taken = ["CustomerId", "CustomerId1"];
        assert_eq!(uniquify("CustomerId", |n| taken.contains(&n)), "CustomerId2");
        assert_eq!(uniquify("OrderId", |n| taken.contains(&n)), "OrderId");
    }
}
