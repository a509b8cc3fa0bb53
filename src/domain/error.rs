use thiserror::Error;

use crate::cache::KeyError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown class or spec `{category}/{subcategory}`")]
    UnknownPair {
        category: String,
        subcategory: String,
    },
    #[error("phase must be between {min} and {max}, got {phase}")]
    PhaseOutOfRange { phase: u32, min: u32, max: u32 },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl DomainError {
    pub fn unknown_pair(category: impl Into<String>, subcategory: impl Into<String>) -> Self {
        Self::UnknownPair {
            category: category.into(),
            subcategory: subcategory.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
