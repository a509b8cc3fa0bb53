use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::export::ExportError;
use crate::application::fetch::FetchError;
use crate::domain::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
}

/// Error response with a public message and an internal diagnostic.
#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    message: String,
    detail: String,
}

impl ApiError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            "infra::http::request",
            StatusCode::BAD_REQUEST,
            message.clone(),
            message,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn domain_message(err: &DomainError) -> String {
    match err {
        DomainError::UnknownPair { .. } => "Invalid class or spec".to_string(),
        DomainError::PhaseOutOfRange { min, max, .. } => {
            format!("Phase must be between {min} and {max}")
        }
        other => other.to_string(),
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match &err {
            FetchError::Validation(domain) => Self::new(
                "infra::http::fetch",
                StatusCode::BAD_REQUEST,
                domain_message(domain),
                err.to_string(),
            ),
            FetchError::Producer(_) => Self::new(
                "infra::http::fetch",
                StatusCode::BAD_GATEWAY,
                "Failed to fetch gear data",
                err.to_string(),
            ),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NotConfigured => Self::new(
                "infra::http::export",
                StatusCode::SERVICE_UNAVAILABLE,
                "Google Sheets service not configured. Please set an exporter access token.",
                "exporter access token is not set",
            ),
            ExportError::Validation(message) => Self::new(
                "infra::http::export",
                StatusCode::BAD_REQUEST,
                message.clone(),
                message,
            ),
            ExportError::Fetch(inner) => inner.into(),
            err @ ExportError::IncompletePhases { .. } => Self::new(
                "infra::http::export",
                StatusCode::BAD_GATEWAY,
                err.to_string(),
                err.to_string(),
            ),
            err @ ExportError::Upstream { .. } => Self::new(
                "infra::http::export",
                StatusCode::BAD_GATEWAY,
                "Failed to export to Google Sheets",
                err.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            success: false,
            error: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(self.source, self.status, self.detail).attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pair_maps_to_bad_request() {
        let err: ApiError = FetchError::Validation(DomainError::unknown_pair("mage", "tank")).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid class or spec");
    }

    #[test]
    fn phase_range_message_uses_bounds() {
        let err: ApiError = FetchError::Validation(DomainError::PhaseOutOfRange {
            phase: 9,
            min: 1,
            max: 6,
        })
        .into();
        assert_eq!(err.message(), "Phase must be between 1 and 6");
    }

    #[test]
    fn export_errors_map_to_gateway_statuses() {
        let err: ApiError = ExportError::NotConfigured.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = ExportError::upstream("boom").into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err: ApiError = ExportError::IncompletePhases { phases: vec![2] }.into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
