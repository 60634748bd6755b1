use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable, location-independent identity of an entity.
///
/// Identifiers survive moves: an entity keeps its identifier while its path
/// changes. The canonical text form is upper-case, so identifiers compare
/// equal regardless of the case they were supplied in.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse an identifier, normalizing it to upper case.
    pub fn new(value: impl AsRef<str>) -> Result<Self, TypeError> {
        let value = value.as_ref().trim();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidIdentifier(value.to_string()));
        }
        Ok(Self(value.to_uppercase()))
    }

    /// Generate a fresh random (v4 UUID) identifier.
    pub fn generate() -> Self {
        Self::from(uuid::Uuid::new_v4())
    }

    /// The canonical text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl From<uuid::Uuid> for Identifier {
    fn from(uuid: uuid::Uuid) -> Self {
        let mut buf = uuid::Uuid::encode_buffer();
        Self(uuid.hyphenated().encode_upper(&mut buf).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_case() {
        let a = Identifier::new("abc-123").unwrap();
        let b = Identifier::new("ABC-123").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ABC-123");
    }

    #[test]
    fn empty_or_blank_is_rejected() {
        assert!(Identifier::new("").is_err());
        assert!(Identifier::new("   ").is_err());
        assert!(Identifier::new("a b").is_err());
    }

    #[test]
    fn generated_identifiers_are_unique_and_upper_case() {
        let a = Identifier::generate();
        let b = Identifier::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), a.as_str().to_uppercase());
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn serde_uses_plain_string() {
        let id = Identifier::new("deadbeef").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"DEADBEEF\"");
        let back: Identifier = serde_json::from_str("\"deadbeef\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn from_str_roundtrip() {
        let id: Identifier = "x-1".parse().unwrap();
        assert_eq!(id.to_string(), "X-1");
    }
}
