//! Read-through, file-backed cache for best-in-slot gear lists.
//!
//! Entries are keyed by class, spec and phase, expire lazily after a TTL, and
//! are filled on miss from a [`application::Producer`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
