use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use validator::Validate;

use super::responses::{AlertResponse, AlertsResponse, DeleteResponse, ScrapeResponse};
use super::AppState;
use crate::deal_manager::SearchRequest;
use crate::deals::{self, DealFilter};
use crate::models::{parse_threshold, NewAlert, NotifyMethod, ProductRef, SearchStatus, Site};
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub keyword: String,
    pub max_products: Option<usize>,
    pub query: Option<String>,
    pub site: Option<Site>,
    pub discount: Option<Value>,
    #[serde(default)]
    pub saved_only: bool,
    #[serde(default)]
    pub saved_urls: Vec<String>,
    #[serde(default)]
    pub view_counts: HashMap<String, u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub product: ProductRef,
    #[serde(default)]
    pub keyword: String,
    pub discount: Option<Value>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Notification method is required"))]
    pub method: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Contact is required"))]
    pub contact: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAlertRequest {
    pub id: Option<String>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// Discount thresholds arrive as free text (`"30%"`, `"Any"`) or as numbers.
fn threshold(value: Option<&Value>) -> Result<Option<i64>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => parse_threshold(Some(text)),
        Some(Value::Number(n)) => parse_threshold(Some(&n.to_string())),
        Some(other) => Err(AppError::validation(format!("Invalid discount threshold: {}", other))),
    }
}

pub async fn scrape(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ScrapeResponse>, AppError> {
    let request = body(payload)?;
    let min_discount = threshold(request.discount.as_ref())?;

    let result = state
        .deals
        .search(SearchRequest {
            keyword: request.keyword,
            max_products: request.max_products,
        })
        .await?;

    if result.status == SearchStatus::Failed {
        tracing::warn!(keyword = %result.keyword, errors = ?result.site_errors(), "Every source failed");
        return Err(AppError::AggregateFetchFailure { keyword: result.keyword });
    }

    // The keyword doubles as the title query unless one is given.
    let filter = DealFilter {
        query: request.query.or_else(|| Some(result.keyword.clone())),
        site: request.site,
        min_discount: min_discount.map(|d| d as u8),
        saved_only: request.saved_only,
    };
    let saved: HashSet<String> = request.saved_urls.into_iter().collect();
    let views = deals::views(&result.products, &filter, &saved, &request.view_counts);

    Ok(Json(ScrapeResponse::new(&result, views)))
}

pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<AlertResponse>, AppError> {
    let request = body(payload)?;
    request.validate()?;

    let method: NotifyMethod = request.method.parse().map_err(AppError::Validation)?;
    let min_discount = threshold(request.discount.as_ref())?;

    let alert = state
        .deals
        .subscribe(NewAlert {
            keyword: request.keyword,
            product: request.product,
            min_discount,
            method,
            contact: request.contact,
        })
        .await?;

    Ok(Json(AlertResponse { success: true, alert }))
}

pub async fn list_alerts(State(state): State<AppState>) -> Result<Json<AlertsResponse>, AppError> {
    let alerts = state.deals.list_alerts().await?;
    Ok(Json(AlertsResponse { success: true, alerts }))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    payload: Result<Json<DeleteAlertRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let request = body(payload)?;
    let id = request
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("Alert id is required"))?;

    let deleted = state.deals.delete_alert(id).await?;
    Ok(Json(DeleteResponse { success: true, deleted }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let plugins = state.deals.plugins();
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "dealscope",
        "sources": plugins.list_source_sites().await,
        "notifiers": plugins.list_notifier_methods().await,
    }))
}
