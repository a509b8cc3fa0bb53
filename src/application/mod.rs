//! Application services: fetch orchestration, export, and their contracts.

pub mod error;
pub mod export;
pub mod fetch;
pub mod producer;

pub use export::{ExportError, ExportReceipt, ExportRequest, ExportService, Exporter};
pub use fetch::{
    BatchFetch, FetchError, FetchOptions, FetchService, FetchSource, PhaseFailure, PhaseFetch,
    WarmReport,
};
pub use producer::{Produced, Producer, ProducerError, Provenance};
