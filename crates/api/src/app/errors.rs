use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockflow_core::{ProductId, TransactionId};
use stockflow_infra::coordinator::CoordinatorError;
use stockflow_infra::history::HistoryError;
use stockflow_infra::product_store::ProductStoreError;
use stockflow_infra::reconciliation::ReconciliationError;

pub fn product_store_error_to_response(err: ProductStoreError) -> axum::response::Response {
    match err {
        ProductStoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        e @ ProductStoreError::InsufficientStock { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_stock", e.to_string())
        }
        ProductStoreError::Validation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg)
        }
        ProductStoreError::TokenConflict(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "intent_token_conflict", msg)
        }
        ProductStoreError::Backend(msg) => {
            tracing::error!(error = %msg, "product store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn coordinator_error_to_response(err: CoordinatorError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        CoordinatorError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        CoordinatorError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "product_not_found", message)
        }
        CoordinatorError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        CoordinatorError::DependencyUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "dependency_unavailable", msg)
        }
        // Distinct code: the transaction exists, only its stock effect is missing.
        CoordinatorError::StockReconciliationRequired {
            transaction_id,
            product_id,
            ..
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "stock_reconciliation_required",
                "message": message,
                "transaction_id": transaction_id,
                "product_id": product_id,
            })),
        )
            .into_response(),
    }
}

pub fn history_error_to_response(err: HistoryError) -> axum::response::Response {
    match err {
        e @ HistoryError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "product_not_found", e.to_string())
        }
        HistoryError::DependencyUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "dependency_unavailable", msg)
        }
        HistoryError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
    }
}

pub fn reconciliation_error_to_response(err: ReconciliationError) -> axum::response::Response {
    match err {
        e @ ReconciliationError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
        ReconciliationError::Backend(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

/// `status` differs per service: the Product service reserves 400 for
/// insufficient stock.
pub fn json_rejection_to_response(
    status: StatusCode,
    rejection: JsonRejection,
) -> axum::response::Response {
    json_error(status, "validation_error", rejection.body_text())
}

pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_product_id(s: &str) -> Result<ProductId, axum::response::Response> {
    s.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"))
}

pub fn parse_transaction_id(s: &str) -> Result<TransactionId, axum::response::Response> {
    s.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id"))
}
