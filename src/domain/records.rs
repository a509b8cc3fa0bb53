//! Gear records produced upstream and served from the cache.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cache::CacheKey;

/// One best-in-slot item for a class/spec/phase.
///
/// Field names follow the JSON documents the service has always emitted, so
/// existing cache files and API clients keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearRecord {
    #[serde(rename = "class")]
    pub category: String,
    #[serde(rename = "spec")]
    pub subcategory: String,
    pub phase: u32,
    pub slot: String,
    pub item_name: String,
    pub item_id: String,
    #[serde(rename = "source")]
    pub source_url: String,
    #[serde(rename = "scrapedAt", with = "time::serde::rfc3339")]
    pub produced_at: OffsetDateTime,
}

impl GearRecord {
    pub fn new(
        key: &CacheKey,
        slot: impl Into<String>,
        item_name: impl Into<String>,
        item_id: impl Into<String>,
        source_url: impl Into<String>,
        produced_at: OffsetDateTime,
    ) -> Self {
        Self {
            category: key.category().to_string(),
            subcategory: key.subcategory().to_string(),
            phase: key.phase(),
            slot: slot.into(),
            item_name: item_name.into(),
            item_id: item_id.into(),
            source_url: source_url.into(),
            produced_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let key = CacheKey::new("mage", "frost", 3).expect("valid key");
        let record = GearRecord::new(
            &key,
            "head",
            "mage frost Helm P3",
            "10003",
            "https://tbc.wowhead.com/item=10003",
            datetime!(2024-05-01 12:00 UTC),
        );

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["class"], "mage");
        assert_eq!(value["spec"], "frost");
        assert_eq!(value["phase"], 3);
        assert_eq!(value["itemName"], "mage frost Helm P3");
        assert_eq!(value["itemId"], "10003");
        assert_eq!(value["source"], "https://tbc.wowhead.com/item=10003");
        assert_eq!(value["scrapedAt"], "2024-05-01T12:00:00Z");

        let back: GearRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }
}
