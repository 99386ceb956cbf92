//! Core data types shared across pipeline components.

use serde::{Deserialize, Serialize};

/// A property whose listing photos should be extracted.
///
/// The key is the stable identifier used in the state file, hash records,
/// manifest entries, and the on-disk directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Stable property key (e.g., a slugged address or listing id)
    pub key: String,
}

impl Property {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_serde() {
        let property = Property::new("123-main-st");
        let json = serde_json::to_string(&property).unwrap();
        assert_eq!(json, r#"{"key":"123-main-st"}"#);
        let parsed: Property = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, property);
    }
}
