use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde_json::Value;
use tracing::warn;

use crate::application::export::{DEFAULT_SHEET_NAME, ExportRequest};

use super::error::ApiError;
use super::models::*;
use super::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn list_catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    let catalog = state.fetch.catalog();
    let classes = catalog
        .as_map()
        .into_iter()
        .map(|(class, specs)| (class.to_string(), specs.to_vec()))
        .collect();
    Json(CatalogResponse {
        success: true,
        data: CatalogData {
            classes,
            phases: catalog.phases().to_vec(),
        },
    })
}

pub async fn get_phase(
    State(state): State<AppState>,
    Path((class, spec, phase)): Path<(String, String, String)>,
) -> ApiResult<PhaseResponse> {
    let phase = parse_phase(&phase)?;
    let fetched = state.fetch.fetch_one(&class, &spec, phase).await?;
    Ok(Json(PhaseResponse {
        success: true,
        cached: fetched.cached(),
        degraded: fetched.degraded(),
        data: fetched.records,
    }))
}

pub async fn get_all_phases(
    State(state): State<AppState>,
    Path((class, spec)): Path<(String, String)>,
) -> ApiResult<AllPhasesResponse> {
    let batch = state.fetch.fetch_all_phases(&class, &spec).await?;
    let failed_phases = batch.failed_phases();
    Ok(Json(AllPhasesResponse {
        success: true,
        data: batch.into_records(),
        failed_phases,
    }))
}

pub async fn export(
    State(state): State<AppState>,
    body: Result<Json<ExportBody>, JsonRejection>,
) -> ApiResult<ExportResponse> {
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let destination = non_blank(body.spreadsheet_id)
        .ok_or_else(|| ApiError::bad_request("spreadsheetId is required"))?;
    let (category, subcategory) = match (non_blank(body.class_name), non_blank(body.spec_name)) {
        (Some(class), Some(spec)) => (class, spec),
        _ => return Err(ApiError::bad_request("className and specName are required")),
    };
    let phase = parse_export_phase(body.phase.as_ref())?;

    let request = ExportRequest {
        destination,
        sheet_name: non_blank(body.worksheet_name)
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
        category,
        subcategory,
        phase,
    };
    let receipt = state.export.export(&request).await?;

    Ok(Json(ExportResponse {
        success: true,
        // updatedRows includes the header row.
        message: format!(
            "Exported {} items to Google Sheets",
            receipt.rows_updated.saturating_sub(1)
        ),
        result: receipt,
    }))
}

/// Storage faults are logged and reported as `degraded`; the route itself
/// never fails.
pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearResponse> {
    let (removed, degraded) = match state.fetch.invalidate_all().await {
        Ok(removed) => (removed, false),
        Err(err) => {
            warn!(
                target = "gearcache::http",
                op = "clear_cache",
                result = "degraded",
                error = %err,
                "Cache could not be cleared"
            );
            (0, true)
        }
    };
    Json(CacheClearResponse {
        success: true,
        message: "Cache cleared successfully",
        removed,
        degraded,
    })
}

pub async fn list_cache_keys(State(state): State<AppState>) -> Json<CacheKeysResponse> {
    Json(CacheKeysResponse {
        success: true,
        keys: state.fetch.cache_keys().await,
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = tokio::fs::metadata(state.fetch.cache().store().root())
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    Json(HealthResponse {
        success: true,
        status: "healthy",
        producer: state.fetch.producer_name(),
        services: HealthServices {
            cache,
            scraper: true,
            sheets: state.export.is_configured(),
        },
    })
}

fn parse_phase(raw: &str) -> Result<u32, ApiError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ApiError::bad_request(format!("Phase must be an integer, got `{raw}`")))
}

fn parse_export_phase(value: Option<&Value>) -> Result<Option<u32>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => match number.as_u64() {
            Some(0) => Ok(None),
            Some(phase) => u32::try_from(phase)
                .map(Some)
                .map_err(|_| ApiError::bad_request("phase is out of range")),
            None => Err(ApiError::bad_request("phase must be a positive integer")),
        },
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => parse_phase(raw).map(Some),
        Some(_) => Err(ApiError::bad_request("phase must be a number")),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
