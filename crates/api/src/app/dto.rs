use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{IntentToken, TransactionType};
use stockflow_infra::history::TransactionView;
use stockflow_infra::reconciliation::ReconciliationEntry;
use stockflow_transactions::TransactionFilter;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `PATCH /products/{id}/stock`.
#[derive(Debug, Deserialize)]
pub struct StockUpdateRequest {
    pub quantity: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Without a token the update is a one-off adjustment and is not deduplicated.
    #[serde(default)]
    pub intent_token: Option<IntentToken>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveReconciliationRequest {
    pub note: String,
}

/// Query string of the transaction listings. Everything arrives as text so
/// bad values can be reported as validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl TransactionQuery {
    pub fn into_filter(self) -> Result<TransactionFilter, axum::response::Response> {
        let start_date = self
            .start_date
            .as_deref()
            .map(|s| parse_date(s, DayBound::Start))
            .transpose()?;
        let end_date = self
            .end_date
            .as_deref()
            .map(|s| parse_date(s, DayBound::End))
            .transpose()?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(validation("start_date must not be after end_date"));
            }
        }
        let kind = self
            .kind
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .map(|k| k.parse::<TransactionType>().map_err(|e| validation(e.to_string())))
            .transpose()?;

        Ok(TransactionFilter {
            product_id: None,
            start_date,
            end_date,
            kind,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum DayBound {
    Start,
    End,
}

/// RFC 3339 timestamps are taken as-is; a bare `YYYY-MM-DD` covers the whole day.
fn parse_date(raw: &str, bound: DayBound) -> Result<DateTime<Utc>, axum::response::Response> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| validation(format!("invalid date {raw:?}; expected YYYY-MM-DD or RFC 3339")))?;
    let time = match bound {
        DayBound::Start => NaiveTime::MIN,
        DayBound::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN),
    };
    Ok(day.and_time(time).and_utc())
}

fn validation(message: impl Into<String>) -> axum::response::Response {
    errors::json_error(axum::http::StatusCode::BAD_REQUEST, "validation_error", message)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

pub type TransactionList = ItemsResponse<TransactionView>;
pub type ReconciliationList = ItemsResponse<ReconciliationEntry>;
