//! Gearcache Cache System
//!
//! Persistent read-through cache for gear lists:
//!
//! - **Key codec**: `<category>_<subcategory>_phase<phase>`, one file per key
//! - **Store**: JSON documents `{ storedAt, payload }` written atomically
//! - **Expiry**: strict TTL comparison, applied lazily on `get`
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `gearcache.toml`:
//!
//! ```toml
//! [cache]
//! directory = "./cache"
//! ttl_hours = 24
//! # sweep_interval_seconds = 3600
//! ```

pub mod clock;
mod config;
mod expiry;
mod keys;
mod read_through;
mod store;
mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use expiry::{ExpiryPolicy, is_expired};
pub use keys::{CacheKey, ENTRY_SUFFIX, KeyError, encode, validate_identifier};
pub use read_through::{CacheLookup, CacheWrite, MissReason, ReadThroughCache, SweepReport};
pub use store::{FileStore, StoreError, StoredEntry};
pub use sweep::spawn_sweeper;
