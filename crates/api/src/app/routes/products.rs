use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};

use stockflow_core::IntentToken;
use stockflow_infra::product_store::{ProductStore, StockOutcome};
use stockflow_products::{NewProduct, ProductUpdate, StockDelta};

use crate::app::{dto, errors, services::ProductServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/stock", patch(update_stock))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| errors::json_rejection_to_response(StatusCode::UNPROCESSABLE_ENTITY, rejection))
}

pub async fn list_products(Extension(services): Extension<Arc<ProductServices>>) -> axum::response::Response {
    match services.store.list().await {
        Ok(items) => (StatusCode::OK, Json(dto::ItemsResponse::from(items))).into_response(),
        Err(e) => errors::product_store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<ProductServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.get(id).await {
        Ok(Some(product)) => (StatusCode::OK, Json(product)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::product_store_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<ProductServices>>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> axum::response::Response {
    let input = match body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.create(input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, name = %product.name, "product created");
            (StatusCode::CREATED, Json(product)).into_response()
        }
        Err(e) => errors::product_store_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<ProductServices>>,
    Path(id): Path<String>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let input = match body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.update(id, input).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::product_store_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<ProductServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::product_store_error_to_response(e),
    }
}

/// Apply a stock movement. Idempotent per `intent_token`.
pub async fn update_stock(
    Extension(services): Extension<Arc<ProductServices>>,
    Path(id): Path<String>,
    payload: Result<Json<dto::StockUpdateRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let token = req.intent_token.unwrap_or_else(IntentToken::new);
    let delta = match StockDelta::new(id, req.kind, req.quantity, token) {
        Ok(d) => d,
        Err(e) => {
            return errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", e.to_string());
        }
    };

    match services.store.apply_delta(&delta).await {
        Ok(outcome) => {
            match outcome {
                StockOutcome::Applied { stock } => tracing::info!(
                    product_id = %id,
                    intent_token = %token,
                    delta = delta.signed(),
                    stock,
                    "stock updated"
                ),
                StockOutcome::AlreadyApplied { stock } => tracing::info!(
                    product_id = %id,
                    intent_token = %token,
                    stock,
                    "stock update replayed; no change"
                ),
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::warn!(product_id = %id, intent_token = %token, error = %e, "stock update rejected");
            errors::product_store_error_to_response(e)
        }
    }
}
