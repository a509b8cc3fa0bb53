//! Cache key definitions.
//!
//! A `CacheKey` names one cell of the category × subcategory × phase key
//! space. Its encoded form (`<category>_<subcategory>_phase<phase>`) doubles as
//! the file stem of the persisted entry, so every component is restricted to
//! `[a-z0-9-]` to keep the encoding injective and filesystem-safe.

use std::fmt;

use thiserror::Error;

/// Suffix appended to an encoded key to form the entry file name.
pub const ENTRY_SUFFIX: &str = ".json";

const DELIMITER: char = '_';
const PHASE_MARKER: &str = "phase";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("{component} must not be empty")]
    Empty { component: &'static str },
    #[error("{component} `{value}` contains unsupported character `{found}`")]
    InvalidCharacter {
        component: &'static str,
        value: String,
        found: char,
    },
    #[error("`{0}` is not an encoded cache key")]
    Malformed(String),
}

/// Identifies a single cached gear list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    category: String,
    subcategory: String,
    phase: u32,
}

impl CacheKey {
    /// Build a key, rejecting identifiers that could alias under encoding.
    pub fn new(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        phase: u32,
    ) -> Result<Self, KeyError> {
        let category = category.into();
        let subcategory = subcategory.into();
        validate_identifier("category", &category)?;
        validate_identifier("subcategory", &subcategory)?;
        Ok(Self {
            category,
            subcategory,
            phase,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn subcategory(&self) -> &str {
        &self.subcategory
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Canonical serialized form.
    pub fn encode(&self) -> String {
        encode(&self.category, &self.subcategory, self.phase)
    }

    /// Entry file name: encoded key plus [`ENTRY_SUFFIX`].
    pub fn file_name(&self) -> String {
        format!("{}{ENTRY_SUFFIX}", self.encode())
    }

    /// Parse an encoded key back into its components.
    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let malformed = || KeyError::Malformed(encoded.to_string());

        let mut parts = encoded.split(DELIMITER);
        let (Some(category), Some(subcategory), Some(phase), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let digits = phase.strip_prefix(PHASE_MARKER).ok_or_else(malformed)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let phase: u32 = digits.parse().map_err(|_| malformed())?;

        let key = Self::new(category, subcategory, phase)?;
        // Leading zeros would decode to a key whose encoding differs.
        if key.encode() != encoded {
            return Err(malformed());
        }
        Ok(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode raw components. Callers must have validated the identifiers.
pub fn encode(category: &str, subcategory: &str, phase: u32) -> String {
    format!("{category}{DELIMITER}{subcategory}{DELIMITER}{PHASE_MARKER}{phase}")
}

/// Check that an identifier is non-empty and drawn from `[a-z0-9-]`.
pub fn validate_identifier(component: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty { component });
    }
    if let Some(found) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(KeyError::InvalidCharacter {
            component,
            value: value.to_string(),
            found,
        });
    }
    Ok(())
}
