use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::deals::DealViews;
use crate::models::{Alert, SearchResult, Site, SourceOutcome};
use crate::utils::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AggregateFetchFailure { .. } => StatusCode::BAD_GATEWAY,
            AppError::SearchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::AggregateFetchFailure { .. } => "ALL_SOURCES_FAILED",
            AppError::SearchTimeout { .. } => "SEARCH_TIMEOUT",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message shown to clients. Internal failures are not spelled out.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound { .. } | AppError::AggregateFetchFailure { .. } | AppError::SearchTimeout { .. } => {
                self.to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        }

        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            code: self.error_code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub keyword: String,
    /// Products found before filtering.
    pub count_all: usize,
    #[serde(flatten)]
    pub views: DealViews,
    pub sources: Vec<SourceOutcome>,
    pub site_errors: BTreeMap<Site, String>,
}

impl ScrapeResponse {
    pub fn new(result: &SearchResult, views: DealViews) -> Self {
        Self {
            success: true,
            keyword: result.keyword.clone(),
            count_all: result.products.len(),
            views,
            sources: result.sources.clone(),
            site_errors: result.site_errors().into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub success: bool,
    pub alert: Alert,
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub success: bool,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: u64,
}
