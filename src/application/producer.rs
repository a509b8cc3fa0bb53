//! Producer contract: the slow upstream source of gear lists.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheKey;
use crate::domain::GearRecord;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("producer failed for `{key}`: {message}")]
    Failed { key: String, message: String },
}

impl ProducerError {
    pub fn failed(key: &CacheKey, message: impl Into<String>) -> Self {
        Self::Failed {
            key: key.encode(),
            message: message.into(),
        }
    }
}

/// Where a produced batch came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Upstream,
    /// Placeholder data substituted after an upstream fault.
    Fallback { reason: String },
}

impl Provenance {
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::Fallback {
            reason: reason.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Fallback { .. } => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    pub records: Vec<GearRecord>,
    pub provenance: Provenance,
}

impl Produced {
    pub fn upstream(records: Vec<GearRecord>) -> Self {
        Self {
            records,
            provenance: Provenance::Upstream,
        }
    }

    pub fn fallback(records: Vec<GearRecord>, reason: impl Into<String>) -> Self {
        Self {
            records,
            provenance: Provenance::fallback(reason),
        }
    }
}

/// Computes the gear list for one key.
///
/// Implementations degrade to fallback data for transient upstream faults and
/// reserve `Err` for failures where no usable data exists at all.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, key: &CacheKey) -> Result<Produced, ProducerError>;

    /// Short name reported by the health endpoint.
    fn describe(&self) -> &'static str;
}
