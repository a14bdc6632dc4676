//! Router assembly and request logging.

use crate::api::{create, delete_by_id, get_by_id, list, update_by_id};
use crate::resource::Resource;
use crate::AppState;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use log::{info, warn};
use orders_core::{Category, Customer, Order, Product};
use std::time::Instant;
use uuid::Uuid;

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the full HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { StatusCode::OK }))
        .nest("/customer", resource_routes::<Customer>())
        .nest("/product", resource_routes::<Product>())
        .nest("/category", resource_routes::<Category>())
        .nest("/order", resource_routes::<Order>())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

fn resource_routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route(
            "/:id",
            get(get_by_id::<R>)
                .put(update_by_id::<R>)
                .delete(delete_by_id::<R>),
        )
}

async fn log_request(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let mut response = next.run(request).await;

    let status = response.status();
    let outcome = if status.is_server_error() { "error" } else { "ok" };
    let line = format!(
        "event=http_request module=api status={} request_id={} method={} path={} code={} duration_ms={}",
        outcome,
        request_id,
        method,
        path,
        status.as_u16(),
        started_at.elapsed().as_millis()
    );
    if status.is_server_error() {
        warn!("{line}");
    } else {
        info!("{line}");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
