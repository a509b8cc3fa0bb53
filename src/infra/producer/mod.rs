//! Producer adapters.

use std::sync::Arc;

use crate::application::producer::Producer;
use crate::config::{ProducerMode, ProducerSettings};

use super::error::InfraError;

mod fallback;
mod page;

pub use fallback::{FallbackProducer, fallback_records};
pub use page::{ExtractedItem, PageProducer, extract_items, parse_item_id};

/// Build the producer selected by `producer.mode`.
pub fn build_producer(settings: &ProducerSettings) -> Result<Arc<dyn Producer>, InfraError> {
    match settings.mode {
        ProducerMode::Fallback => Ok(Arc::new(FallbackProducer::new())),
        ProducerMode::Upstream => Ok(Arc::new(PageProducer::new(
            settings.base_url.clone(),
            settings.timeout,
        )?)),
    }
}
