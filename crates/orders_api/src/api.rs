//! Resource handlers shared by every entity route.
//!
//! # Responsibility
//! - Parse ids, paging parameters and JSON bodies before touching the store.
//! - Run the service call on the blocking pool under the request deadline.
//!
//! # Invariants
//! - Malformed input is answered with `400` and never reaches the repository.
//! - List responses name items by the entity's plural and omit `next` once
//!   the walk is complete.

use crate::error::ApiError;
use crate::resource::Resource;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use log::warn;
use orders_core::{EntityId, EntityService, IndexedRepository, PageRequest, ServiceResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

type ResourceService<R> = EntityService<R, IndexedRepository<R>>;

/// Raw list query; numbers are parsed by hand so bad input maps to `400`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub cursor: Option<String>,
    pub size: Option<String>,
}

pub async fn create<R: Resource>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<R>), ApiError> {
    let body: R::CreateBody = parse_body(&body)?;
    let created = with_service::<R, _, _>(&state, "create", move |service| {
        service.create(R::from_create(body))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list<R: Resource>(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let request = parse_page(&params)?;
    let page = with_service::<R, _, _>(&state, "list", move |service| service.list(request)).await?;

    let items = serde_json::to_value(&page.items)
        .map_err(|err| ApiError::Internal(format!("list encode failed: {err}")))?;
    let mut body = Map::new();
    body.insert(R::INDEX_SET.to_string(), items);
    if page.next_cursor != 0 {
        body.insert("next".to_string(), Value::from(page.next_cursor));
    }
    Ok(Json(Value::Object(body)))
}

pub async fn get_by_id<R: Resource>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<R>, ApiError> {
    let id = parse_id(&raw_id)?;
    let record = with_service::<R, _, _>(&state, "get", move |service| service.get(id)).await?;
    Ok(Json(record))
}

pub async fn update_by_id<R: Resource>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<R>, ApiError> {
    let id = parse_id(&raw_id)?;
    let body: R::UpdateBody = parse_body(&body)?;
    let updated = with_service::<R, _, _>(&state, "update", move |service| {
        service.update_with(id, |record| record.apply_update(body))
    })
    .await?;
    Ok(Json(updated))
}

pub async fn delete_by_id<R: Resource>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    with_service::<R, _, _>(&state, "delete", move |service| service.delete(id)).await?;
    Ok(StatusCode::OK)
}

async fn with_service<R, T, F>(
    state: &AppState,
    operation: &'static str,
    f: F,
) -> Result<T, ApiError>
where
    R: Resource,
    T: Send + 'static,
    F: FnOnce(&ResourceService<R>) -> ServiceResult<T> + Send + 'static,
{
    let store = state.store.clone();
    let task = tokio::task::spawn_blocking(move || {
        let service = EntityService::new(IndexedRepository::<R>::new(store));
        f(&service)
    });

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(join_err)) => Err(ApiError::Internal(format!(
            "{operation} task failed: {join_err}"
        ))),
        Err(_) => {
            warn!(
                "event=http_timeout module=api status=error entity={} operation={} timeout_ms={}",
                R::LABEL,
                operation,
                state.request_timeout.as_millis()
            );
            Err(ApiError::Timeout { operation })
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(format!("invalid body: {err}")))
}

fn parse_id(raw: &str) -> Result<EntityId, ApiError> {
    raw.parse::<EntityId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid id `{raw}`")))
}

fn parse_page(params: &ListParams) -> Result<PageRequest, ApiError> {
    let number = |name: &str, raw: Option<&str>| -> Result<u64, ApiError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid {name} `{value}`"))),
            None => Ok(0),
        }
    };
    let cursor = number("cursor", params.cursor.as_deref())?;
    let size = number("size", params.size.as_deref())?;
    Ok(PageRequest::new(cursor, size))
}
