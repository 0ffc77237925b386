//! Opaque identifiers for the retrieval data model.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing string as an id.
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a new random id (UUID v4).
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

opaque_id!(CompoundId, "Identifier for an ingested document.");
opaque_id!(MoleculeId, "Identifier for a byte-range within a compound.");

/// Identifier for an atom (tag/concept). Atom identity IS its canonical
/// name string — there is no separate surrogate key, since the tag-walker
/// and tagger both need to round-trip names without a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(String);

impl AtomId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(normalize_atom_name(&name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AtomId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AtomId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Canonicalize a tag/atom name: lowercase, trimmed, punctuation-free,
/// length 1-64 (per the Tagger contract in spec §4.4).
pub fn normalize_atom_name(raw: &str) -> String {
    let lowered: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase();
    lowered.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_ids_normalize_case_and_punctuation() {
        assert_eq!(AtomId::new("ADHD!").as_str(), "adhd");
        assert_eq!(AtomId::new("  Project Chronos  ").as_str(), "project chronos");
    }

    #[test]
    fn atom_id_length_is_capped() {
        let long = "a".repeat(200);
        assert_eq!(AtomId::new(long.as_str()).as_str().len(), 64);
    }

    #[test]
    fn compound_ids_round_trip_display() {
        let id = CompoundId::from_string("notes/chronos.md");
        assert_eq!(id.to_string(), "notes/chronos.md");
    }
}
