//! Google Sheets v4 exporter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::application::export::{ExportError, ExportReceipt, Exporter, sheet_rows};
use crate::domain::GearRecord;
use crate::infra::error::InfraError;

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    #[serde(default)]
    updated_rows: Option<u64>,
    #[serde(default)]
    updated_range: Option<String>,
}

/// Uploads gear rows to a spreadsheet, replacing the target worksheet contents.
pub struct SheetsExporter {
    client: Client,
    api_base: Url,
    access_token: String,
}

impl SheetsExporter {
    pub fn new(api_base: Url, access_token: String, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("gearcache/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            api_base,
            access_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ExportError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ExportError::upstream("sheets api base cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    async fn ensure_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), ExportError> {
        let mut url = self.endpoint(&[spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = send(self.authorized(self.client.get(url)))
            .await?
            .json()
            .await
            .map_err(|err| ExportError::upstream(format!("invalid spreadsheet metadata: {err}")))?;

        if meta
            .sheets
            .iter()
            .any(|sheet| sheet.properties.title == sheet_name)
        {
            return Ok(());
        }

        let url = self.endpoint(&[&format!("{spreadsheet_id}:batchUpdate")])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": sheet_name } } }]
        });
        send(self.authorized(self.client.post(url)).json(&body)).await?;
        debug!(
            target = "gearcache::infra::exporter",
            spreadsheet = spreadsheet_id,
            sheet = sheet_name,
            "Created worksheet"
        );
        Ok(())
    }

    async fn clear(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), ExportError> {
        let range = format!("{sheet_name}!A:Z");
        let url = self.endpoint(&[spreadsheet_id, "values", &format!("{range}:clear")])?;
        send(self.authorized(self.client.post(url)).json(&json!({}))).await?;
        Ok(())
    }

    async fn write(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        rows: &[Vec<String>],
    ) -> Result<ExportReceipt, ExportError> {
        let range = format!("{sheet_name}!A1");
        let mut url = self.endpoint(&[spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        let response: UpdateValuesResponse = send(self.authorized(self.client.put(url)).json(&body))
            .await?
            .json()
            .await
            .map_err(|err| ExportError::upstream(format!("invalid update response: {err}")))?;

        Ok(ExportReceipt {
            rows_updated: response.updated_rows.unwrap_or(rows.len() as u64),
            range: response.updated_range.unwrap_or(range),
        })
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ExportError> {
    let response = request
        .send()
        .await
        .map_err(|err| ExportError::upstream(format!("request failed: {err}")))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(ExportError::upstream(format!(
        "sheets api responded with {status}: {}",
        detail.trim()
    )))
}

#[async_trait]
impl Exporter for SheetsExporter {
    async fn export(
        &self,
        destination: &str,
        sheet_name: &str,
        records: &[GearRecord],
    ) -> Result<ExportReceipt, ExportError> {
        let rows = sheet_rows(records);
        self.ensure_sheet(destination, sheet_name).await?;
        self.clear(destination, sheet_name).await?;
        let receipt = self.write(destination, sheet_name, &rows).await?;
        info!(
            target = "gearcache::infra::exporter",
            spreadsheet = destination,
            sheet = sheet_name,
            rows = receipt.rows_updated,
            range = %receipt.range,
            "Uploaded worksheet"
        );
        Ok(receipt)
    }
}
