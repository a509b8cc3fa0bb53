//! Domain layer types and invariants.

pub mod catalog;
pub mod error;
pub mod records;

pub use catalog::{Catalog, PhaseRange};
pub use error::DomainError;
pub use records::GearRecord;
