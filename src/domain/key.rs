//! Counter keys: the resource class and the caller it is consumed by.
//!
//! A [`CounterKey`] uniquely identifies one quota subject. Two requests with the
//! same resource class and caller identifier draw from the same counter; any
//! difference in either component yields an independent counter.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of a category of protected operation (e.g. `"auth"`, `"upload"`).
///
/// Cheap to clone: the name is shared behind an `Arc<str>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceClass(Arc<str>);

impl ResourceClass {
    /// Create a resource class from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        ResourceClass(Arc::from(name.as_ref()))
    }

    /// The class name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceClass {
    fn from(name: &str) -> Self {
        ResourceClass::new(name)
    }
}

impl From<String> for ResourceClass {
    fn from(name: String) -> Self {
        ResourceClass(Arc::from(name))
    }
}

// Lets policy lookups use `&str` against maps keyed by `ResourceClass`.
impl Borrow<str> for ResourceClass {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite key of a counter: `(resource class, caller identifier)`.
///
/// The caller identifier is opaque. It is never validated or normalized, so
/// `"ip:1.2.3.4"` and `"IP:1.2.3.4"` are different subjects and the empty
/// string is a valid (if low-entropy) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    class: ResourceClass,
    caller: Box<str>,
}

impl CounterKey {
    /// Build a key from a class and a caller identifier.
    pub fn new(class: impl Into<ResourceClass>, caller: impl Into<Box<str>>) -> Self {
        Self {
            class: class.into(),
            caller: caller.into(),
        }
    }

    /// The resource class component.
    pub fn class(&self) -> &ResourceClass {
        &self.class
    }

    /// The caller identifier component.
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Rough heap footprint of the key, used for memory estimates.
    pub fn heap_size(&self) -> usize {
        self.class.as_str().len() + self.caller.len()
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_same_components_are_equal() {
        let a = CounterKey::new("auth", "ip:1.2.3.4");
        let b = CounterKey::new(ResourceClass::new("auth"), String::from("ip:1.2.3.4"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_class_and_caller_both_distinguish() {
        let base = CounterKey::new("auth", "user:1");
        assert_ne!(base, CounterKey::new("auth", "user:2"));
        assert_ne!(base, CounterKey::new("upload", "user:1"));
    }

    #[test]
    fn test_caller_is_not_normalized() {
        assert_ne!(
            CounterKey::new("auth", "ip:1.2.3.4"),
            CounterKey::new("auth", "IP:1.2.3.4")
        );
        assert_ne!(
            CounterKey::new("auth", "ip:1.2.3.4"),
            CounterKey::new("auth", " ip:1.2.3.4")
        );
    }

    #[test]
    fn test_empty_caller_is_valid() {
        let key = CounterKey::new("general", "");
        assert_eq!(key.caller(), "");
        assert_eq!(key.to_string(), "general/");
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ResourceClass::new("mint"), 3);
        assert_eq!(map.get("mint"), Some(&3));
        assert_eq!(map.get("auth"), None);
    }

    #[test]
    fn test_display() {
        let key = CounterKey::new("upload", "user:42");
        assert_eq!(key.to_string(), "upload/user:42");
        assert_eq!(key.class().to_string(), "upload");
    }
}
