use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockflow_transactions::{NewTransaction, TransactionFilter};

use crate::app::{dto, errors, services::TransactionServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/product/:product_id", get(list_product_transactions))
}

fn filter(query: Result<Query<dto::TransactionQuery>, QueryRejection>) -> Result<TransactionFilter, axum::response::Response> {
    let Query(query) = query.map_err(errors::query_rejection_to_response)?;
    query.into_filter()
}

/// Record a purchase or sale and move stock accordingly.
///
/// The workflow runs detached from this request: if the client goes away
/// mid-flight the transaction still finishes (or lands in reconciliation).
pub async fn create_transaction(
    Extension(services): Extension<Arc<TransactionServices>>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> axum::response::Response {
    let input = match payload {
        Ok(Json(v)) => v,
        Err(rejection) => return errors::json_rejection_to_response(StatusCode::BAD_REQUEST, rejection),
    };

    match services.coordinator.submit(input).await {
        Ok(Ok(view)) => (StatusCode::CREATED, Json(view)).into_response(),
        Ok(Err(e)) => errors::coordinator_error_to_response(e),
        Err(join) => {
            tracing::error!(alert = true, error = %join, "transaction workflow task failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "transaction workflow failed",
            )
        }
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<TransactionServices>>,
    query: Result<Query<dto::TransactionQuery>, QueryRejection>,
) -> axum::response::Response {
    let filter = match filter(query) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services.history.list_all(&filter).await {
        Ok(items) => (StatusCode::OK, Json(dto::TransactionList::from(items))).into_response(),
        Err(e) => errors::history_error_to_response(e),
    }
}

pub async fn list_product_transactions(
    Extension(services): Extension<Arc<TransactionServices>>,
    Path(product_id): Path<String>,
    query: Result<Query<dto::TransactionQuery>, QueryRejection>,
) -> axum::response::Response {
    let product_id = match errors::parse_product_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let filter = match filter(query) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services.history.list_by_product(product_id, &filter).await {
        Ok(items) => (StatusCode::OK, Json(dto::TransactionList::from(items))).into_response(),
        Err(e) => errors::history_error_to_response(e),
    }
}
