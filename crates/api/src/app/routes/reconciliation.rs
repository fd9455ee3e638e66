use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockflow_infra::reconciliation::ReconciliationLog;

use crate::app::{dto, errors, services::TransactionServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_open))
        .route("/run", post(run_reconciliation))
        .route("/:transaction_id/resolve", post(resolve))
}

/// Entries still awaiting replay or an operator.
pub async fn list_open(Extension(services): Extension<Arc<TransactionServices>>) -> axum::response::Response {
    match services.reconciler.log().open().await {
        Ok(items) => (StatusCode::OK, Json(dto::ReconciliationList::from(items))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn run_reconciliation(
    Extension(services): Extension<Arc<TransactionServices>>,
) -> axum::response::Response {
    match services.reconciler.reconcile_pending().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn resolve(
    Extension(services): Extension<Arc<TransactionServices>>,
    Path(transaction_id): Path<String>,
    payload: Result<Json<dto::ResolveReconciliationRequest>, JsonRejection>,
) -> axum::response::Response {
    let transaction_id = match errors::parse_transaction_id(&transaction_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match payload {
        Ok(Json(v)) => v,
        Err(rejection) => return errors::json_rejection_to_response(StatusCode::BAD_REQUEST, rejection),
    };
    let note = req.note.trim();
    if note.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "note cannot be empty");
    }

    match services.reconciler.resolve_manually(transaction_id, note).await {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}
