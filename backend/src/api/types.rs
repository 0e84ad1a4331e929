//! REST API types for the dashboard frontend.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::loader::TableNote;
use crate::models::EntitySummary;
use crate::transform::{DashboardView, MarketOverview, PriceChart};

/// `ready` when prices were found, `empty` when every source was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardStatus {
    Ready,
    Empty,
}

/// Everything one dashboard render needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub request_id: String,
    pub status: DashboardStatus,
    pub source: String,
    /// Selector actually applied (`ALL` when the requested city is unknown).
    pub city: String,
    pub dimensions: Vec<String>,
    pub chart: PriceChart,
    pub summaries: Vec<EntitySummary>,
    pub overview: MarketOverview,
    pub notes: Vec<TableNote>,
}

impl DashboardResponse {
    pub fn ready(view: DashboardView, notes: Vec<TableNote>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            status: DashboardStatus::Ready,
            source: view.source,
            city: view.city,
            dimensions: view.dimensions,
            chart: view.chart,
            summaries: view.summaries,
            overview: view.overview,
            notes,
        }
    }

    /// The "no data available" state.
    pub fn empty(source: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            status: DashboardStatus::Empty,
            source: source.into(),
            city: city.into(),
            dimensions: Vec::new(),
            chart: PriceChart::default(),
            summaries: Vec::new(),
            overview: MarketOverview::default(),
            notes: Vec::new(),
        }
    }
}

/// `GET /api/dashboard` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    /// City name or `ALL`. Defaults to the stored selection.
    pub city: Option<String>,
    /// `name` (default) or `change`.
    pub order: Option<String>,
}

/// `PUT /api/selection` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub selected: String,
    pub fallback: Option<String>,
}

/// `POST /api/reload` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub status: DashboardStatus,
    pub source: String,
    pub records: usize,
    pub dimensions: Vec<String>,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_shape() {
        let response = DashboardResponse::empty("crops.csv", "ALL");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "empty");
        assert_eq!(json["source"], "crops.csv");
        assert_eq!(json["summaries"], json!([]));
        assert_eq!(json["overview"]["topGainer"], Value::Null);
        assert!(Uuid::parse_str(json["requestId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_error_response() {
        let json = error_response("boom");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
    }
}
