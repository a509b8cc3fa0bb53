//! Exporter adapters.

use std::sync::Arc;

use crate::application::export::Exporter;
use crate::config::ExporterSettings;

use super::error::InfraError;

mod sheets;

pub use sheets::SheetsExporter;

/// Build the spreadsheet exporter, or `None` when no access token is configured.
pub fn build_exporter(
    settings: &ExporterSettings,
) -> Result<Option<Arc<dyn Exporter>>, InfraError> {
    let Some(token) = settings.access_token.clone() else {
        return Ok(None);
    };
    let exporter = SheetsExporter::new(settings.api_base.clone(), token, settings.timeout)?;
    Ok(Some(Arc::new(exporter)))
}
