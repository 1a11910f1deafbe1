//! Caller identifiers.

use std::borrow::Borrow;
use std::fmt;

/// An opaque key that partitions rate tracking between callers.
///
/// Usually a client network address, but any string is accepted as-is,
/// including the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Lets the limiter's map be queried with a plain `&str`.
impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_identifier_is_opaque() {
        let id = Identifier::new("2001:db8::1");
        assert_eq!(id.to_string(), "2001:db8::1");

        let empty = Identifier::from("");
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn test_identifier_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Identifier::from("1.2.3.4"), 1);

        assert_eq!(map.get("1.2.3.4"), Some(&1));
        assert_eq!(map.get("5.6.7.8"), None);
    }
}
