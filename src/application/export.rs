//! Exporting finished gear batches to a spreadsheet.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::application::fetch::{FetchError, FetchService};
use crate::domain::GearRecord;

pub const DEFAULT_SHEET_NAME: &str = "BiS Data";

pub const SHEET_HEADER: [&str; 8] = [
    "Class",
    "Spec",
    "Phase",
    "Slot",
    "Item Name",
    "Item ID",
    "Source URL",
    "Scraped At",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export is not configured")]
    NotConfigured,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("refusing to export incomplete data: phases {phases:?} failed")]
    IncompletePhases { phases: Vec<u32> },
    #[error("spreadsheet upload failed: {message}")]
    Upstream { message: String },
}

impl ExportError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub destination: String,
    pub sheet_name: String,
    pub category: String,
    pub subcategory: String,
    /// Single phase, or every catalog phase when absent.
    pub phase: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    pub rows_updated: u64,
    pub range: String,
}

/// Spreadsheet sink. An upload replaces the whole sheet.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(
        &self,
        destination: &str,
        sheet_name: &str,
        records: &[GearRecord],
    ) -> Result<ExportReceipt, ExportError>;
}

/// Header row followed by one row per record.
pub fn sheet_rows(records: &[GearRecord]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(SHEET_HEADER.iter().map(|cell| (*cell).to_string()).collect());
    rows.extend(records.iter().map(|record| {
        vec![
            record.category.clone(),
            record.subcategory.clone(),
            record.phase.to_string(),
            record.slot.clone(),
            record.item_name.clone(),
            record.item_id.clone(),
            record.source_url.clone(),
            record.produced_at.format(&Rfc3339).unwrap_or_default(),
        ]
    }));
    rows
}

pub struct ExportService {
    fetch: Arc<FetchService>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl ExportService {
    pub fn new(fetch: Arc<FetchService>, exporter: Option<Arc<dyn Exporter>>) -> Self {
        Self { fetch, exporter }
    }

    pub fn is_configured(&self) -> bool {
        self.exporter.is_some()
    }

    pub async fn export(&self, request: &ExportRequest) -> Result<ExportReceipt, ExportError> {
        let exporter = self.exporter.as_ref().ok_or(ExportError::NotConfigured)?;
        if request.destination.trim().is_empty() {
            return Err(ExportError::Validation(
                "spreadsheetId must not be empty".to_string(),
            ));
        }
        if request.sheet_name.trim().is_empty() {
            return Err(ExportError::Validation(
                "worksheetName must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let records = match request.phase {
            Some(phase) => {
                self.fetch
                    .fetch_one(&request.category, &request.subcategory, phase)
                    .await?
                    .records
            }
            None => {
                let batch = self
                    .fetch
                    .fetch_all_phases(&request.category, &request.subcategory)
                    .await?;
                if !batch.is_complete() {
                    return Err(ExportError::IncompletePhases {
                        phases: batch.failed_phases(),
                    });
                }
                batch.into_records()
            }
        };

        let receipt = exporter
            .export(&request.destination, &request.sheet_name, &records)
            .await?;
        info!(
            target = "gearcache::application::export",
            op = "export",
            result = "ok",
            category = %request.category,
            subcategory = %request.subcategory,
            rows = receipt.rows_updated,
            range = %receipt.range,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Exported gear data"
        );
        Ok(receipt)
    }
}
