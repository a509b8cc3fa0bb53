use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::export::ExportReceipt;
use crate::domain::GearRecord;

#[derive(Debug, Serialize)]
pub struct CatalogData {
    pub classes: BTreeMap<String, Vec<String>>,
    pub phases: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub success: bool,
    pub data: CatalogData,
}

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub success: bool,
    pub data: Vec<GearRecord>,
    pub cached: bool,
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllPhasesResponse {
    pub success: bool,
    pub data: Vec<GearRecord>,
    pub failed_phases: Vec<u32>,
}

/// Export request body. Every field is optional so missing values produce
/// a readable 400 instead of a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBody {
    pub spreadsheet_id: Option<String>,
    pub worksheet_name: Option<String>,
    pub class_name: Option<String>,
    pub spec_name: Option<String>,
    /// Number or numeric string; absent, null, `0` and `""` mean all phases.
    pub phase: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub message: String,
    pub result: ExportReceipt,
}

#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub success: bool,
    pub message: &'static str,
    pub removed: usize,
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheKeysResponse {
    pub success: bool,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub cache: bool,
    pub scraper: bool,
    pub sheets: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub producer: &'static str,
    pub services: HealthServices,
}
