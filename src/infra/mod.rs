//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod exporter;
pub mod http;
pub mod producer;
pub mod telemetry;
