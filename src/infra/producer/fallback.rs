//! Deterministic placeholder gear lists.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::producer::{Produced, Producer, ProducerError};
use crate::cache::CacheKey;
use crate::domain::GearRecord;

const ITEM_SOURCE_BASE: &str = "https://tbc.wowhead.com/item=";

/// Slot, display piece, and item id base for each placeholder record.
const FALLBACK_SLOTS: [(&str, &str, u32); 7] = [
    ("head", "Helm", 10_000),
    ("neck", "Necklace", 20_000),
    ("shoulder", "Shoulders", 30_000),
    ("chest", "Chestpiece", 40_000),
    ("hands", "Gloves", 50_000),
    ("legs", "Leggings", 60_000),
    ("feet", "Boots", 70_000),
];

/// Placeholder records for `key`: one per slot, item id `base + phase`.
pub fn fallback_records(key: &CacheKey, produced_at: OffsetDateTime) -> Vec<GearRecord> {
    FALLBACK_SLOTS
        .iter()
        .map(|(slot, piece, base)| {
            let item_id = (base + key.phase()).to_string();
            GearRecord::new(
                key,
                *slot,
                format!(
                    "{} {} {} P{}",
                    key.category(),
                    key.subcategory(),
                    piece,
                    key.phase()
                ),
                item_id.clone(),
                format!("{ITEM_SOURCE_BASE}{item_id}"),
                produced_at,
            )
        })
        .collect()
}

/// Producer that never contacts upstream.
#[derive(Debug, Clone, Default)]
pub struct FallbackProducer;

impl FallbackProducer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Producer for FallbackProducer {
    async fn produce(&self, key: &CacheKey) -> Result<Produced, ProducerError> {
        Ok(Produced::fallback(
            fallback_records(key, OffsetDateTime::now_utc()),
            "upstream scraping disabled",
        ))
    }

    fn describe(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_slots_with_phase_offset_ids() {
        let key = CacheKey::new("mage", "frost", 3).expect("key");
        let records = fallback_records(&key, OffsetDateTime::UNIX_EPOCH);

        assert_eq!(records.len(), 7);
        let slots: Vec<&str> = records.iter().map(|r| r.slot.as_str()).collect();
        assert_eq!(
            slots,
            ["head", "neck", "shoulder", "chest", "hands", "legs", "feet"]
        );
        assert_eq!(records[0].item_id, "10003");
        assert_eq!(records[0].item_name, "mage frost Helm P3");
        assert_eq!(records[6].item_id, "70003");
        assert_eq!(records[6].source_url, "https://tbc.wowhead.com/item=70003");
        assert!(records.iter().all(|r| r.category == "mage" && r.phase == 3));
    }

    #[tokio::test]
    async fn produce_reports_fallback_provenance() {
        let key = CacheKey::new("warrior", "arms", 1).expect("key");
        let produced = FallbackProducer::new().produce(&key).await.expect("produce");
        assert!(produced.provenance.is_fallback());
        assert_eq!(produced.records.len(), 7);
    }
}
