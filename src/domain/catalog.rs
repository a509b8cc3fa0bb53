//! The enumerable key space: categories, their subcategories, and the phase range.

use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::cache::{CacheKey, validate_identifier};

use super::error::DomainError;

const REFERENCE_CATEGORIES: [(&str, [&str; 3]); 9] = [
    ("druid", ["balance", "feral", "restoration"]),
    ("hunter", ["beast-mastery", "marksmanship", "survival"]),
    ("mage", ["arcane", "fire", "frost"]),
    ("paladin", ["holy", "protection", "retribution"]),
    ("priest", ["discipline", "holy", "shadow"]),
    ("rogue", ["assassination", "combat", "subtlety"]),
    ("shaman", ["elemental", "enhancement", "restoration"]),
    ("warlock", ["affliction", "demonology", "destruction"]),
    ("warrior", ["arms", "fury", "protection"]),
];
const REFERENCE_PHASE_MIN: u32 = 1;
const REFERENCE_PHASE_MAX: u32 = 6;

/// Inclusive range of valid phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseRange {
    min: u32,
    max: u32,
}

impl PhaseRange {
    pub fn new(min: u32, max: u32) -> Result<Self, DomainError> {
        if min > max {
            return Err(DomainError::validation(format!(
                "phase range is empty: min {min} exceeds max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, phase: u32) -> bool {
        (self.min..=self.max).contains(&phase)
    }

    pub fn iter(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CategoryEntry {
    name: String,
    subcategories: Vec<String>,
}

/// Catalog of valid keys, supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    categories: Vec<CategoryEntry>,
    phases: PhaseRange,
}

impl Catalog {
    /// Build a catalog, validating every identifier with the key codec rules.
    pub fn new<C, S>(categories: C, phases: PhaseRange) -> Result<Self, DomainError>
    where
        C: IntoIterator<Item = (String, S)>,
        S: IntoIterator<Item = String>,
    {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (name, subcategories) in categories {
            validate_identifier("category", &name)?;
            if !seen.insert(name.clone()) {
                return Err(DomainError::validation(format!(
                    "category `{name}` is listed twice"
                )));
            }

            let mut subs: Vec<String> = Vec::new();
            for sub in subcategories {
                validate_identifier("subcategory", &sub)?;
                if subs.contains(&sub) {
                    return Err(DomainError::validation(format!(
                        "subcategory `{sub}` is listed twice under `{name}`"
                    )));
                }
                subs.push(sub);
            }
            if subs.is_empty() {
                return Err(DomainError::validation(format!(
                    "category `{name}` has no subcategories"
                )));
            }

            entries.push(CategoryEntry {
                name,
                subcategories: subs,
            });
        }

        if entries.is_empty() {
            return Err(DomainError::validation("catalog has no categories"));
        }

        Ok(Self {
            categories: entries,
            phases,
        })
    }

    /// Nine classes with three specs each, phases 1 through 6.
    pub fn reference() -> Self {
        Self {
            categories: REFERENCE_CATEGORIES
                .iter()
                .map(|(name, subs)| CategoryEntry {
                    name: (*name).to_string(),
                    subcategories: subs.iter().map(|s| (*s).to_string()).collect(),
                })
                .collect(),
            phases: PhaseRange {
                min: REFERENCE_PHASE_MIN,
                max: REFERENCE_PHASE_MAX,
            },
        }
    }

    pub fn phases(&self) -> PhaseRange {
        self.phases
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|entry| entry.name.as_str())
    }

    pub fn subcategories(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|entry| entry.name == category)
            .map(|entry| entry.subcategories.as_slice())
    }

    /// Category → subcategories, as exposed by the catalog endpoint.
    pub fn as_map(&self) -> BTreeMap<&str, &[String]> {
        self.categories
            .iter()
            .map(|entry| (entry.name.as_str(), entry.subcategories.as_slice()))
            .collect()
    }

    pub fn contains_pair(&self, category: &str, subcategory: &str) -> bool {
        self.subcategories(category)
            .is_some_and(|subs| subs.iter().any(|s| s == subcategory))
    }

    pub fn validate_pair(&self, category: &str, subcategory: &str) -> Result<(), DomainError> {
        if self.contains_pair(category, subcategory) {
            Ok(())
        } else {
            Err(DomainError::unknown_pair(category, subcategory))
        }
    }

    pub fn validate_phase(&self, phase: u32) -> Result<(), DomainError> {
        if self.phases.contains(phase) {
            Ok(())
        } else {
            Err(DomainError::PhaseOutOfRange {
                phase,
                min: self.phases.min,
                max: self.phases.max,
            })
        }
    }

    /// Resolve a request into a cache key, or reject it.
    pub fn validate_key(
        &self,
        category: &str,
        subcategory: &str,
        phase: u32,
    ) -> Result<CacheKey, DomainError> {
        self.validate_pair(category, subcategory)?;
        self.validate_phase(phase)?;
        Ok(CacheKey::new(category, subcategory, phase)?)
    }

    /// Every key in the catalog, category-major then phase order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys = Vec::new();
        for entry in &self.categories {
            for sub in &entry.subcategories {
                for phase in self.phases.iter() {
                    if let Ok(key) = CacheKey::new(entry.name.as_str(), sub.as_str(), phase) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::reference()
    }
}
