use std::collections::HashMap;

use axum::extract::{Extension, Json, Path, Query, State};
use chrono::Utc;
use serde_json::{Map, Value};

use super::model::{CountResponse, DeleteResponse, ListParams, ListResponse};
use crate::{
    AppState,
    error::AppError,
    middleware::require_superadmin,
    pager::{Pagination, PagerKey},
    store::{self, Document, Filter, ID_FIELD, OrderBy},
    token::TokenPayload,
    utils::{ApiResponse, hash_password, success_to_api_response},
    views::Collection,
};

const PASSWORD_FIELD: &str = "password";
const PASSWORD_HASH_FIELD: &str = "password_hash";
const EMAIL_FIELD: &str = "email";
/// Taken by the count route, so no document may use it as its id.
const RESERVED_ID: &str = "count";

fn parse_collection(name: &str) -> Result<Collection, AppError> {
    name.parse()
        .map_err(|_| AppError::NotFound(format!("collection {name}")))
}

/// Full document for detail screens, minus anything secret.
fn detail(doc: &Document) -> Value {
    let mut json = doc.to_json();
    if let Some(obj) = json.as_object_mut() {
        obj.remove(PASSWORD_HASH_FIELD);
    }
    json
}

/// Normalizes a write body. Account writes need a superadmin, get a lower-case
/// email and have a plain `password` swapped for its hash.
fn prepare_write(
    collection: Collection,
    claims: &TokenPayload,
    mut data: Map<String, Value>,
) -> Result<Map<String, Value>, AppError> {
    if collection != Collection::Users {
        data.remove(PASSWORD_HASH_FIELD);
        return Ok(data);
    }

    require_superadmin(claims)?;
    if let Some(email) = data.get(EMAIL_FIELD) {
        let email = email
            .as_str()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Validation("email must be a non-empty string".into()))?;
        data.insert(EMAIL_FIELD.into(), Value::String(email));
    }
    data.remove(PASSWORD_HASH_FIELD);
    if let Some(password) = data.remove(PASSWORD_FIELD) {
        let password = password
            .as_str()
            .filter(|p| p.len() >= 6)
            .ok_or_else(|| AppError::Validation("password must be at least 6 characters".into()))?;
        data.insert(
            PASSWORD_HASH_FIELD.into(),
            Value::String(hash_password(password)?),
        );
    }
    Ok(data)
}

/// Logins look accounts up by email, so no two may share one.
async fn ensure_email_free(
    state: &AppState,
    data: &Map<String, Value>,
    own_id: Option<&str>,
) -> Result<(), AppError> {
    let Some(email) = data.get(EMAIL_FIELD) else {
        return Ok(());
    };
    let query = store::Query::new(Collection::Users.as_str(), OrderBy::asc(ID_FIELD))
        .filter(Filter::new().eq(EMAIL_FIELD, email.clone()))
        .limit(2);
    let taken = state
        .store
        .query(&query)
        .await?
        .iter()
        .any(|doc| Some(doc.id.as_str()) != own_id);
    if taken {
        return Err(AppError::Validation(format!(
            "email {} is already in use",
            email.as_str().unwrap_or_default()
        )));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenPayload>,
    Path(name): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<ListResponse>>, AppError> {
    let collection = parse_collection(&name)?;
    let params = ListParams::parse(raw, &state.config)?;
    let pager = state.pagers.pager_for(PagerKey {
        owner: claims.identity.email.clone(),
        collection: collection.as_str().to_string(),
        order_by: params
            .order_by
            .clone()
            .unwrap_or_else(|| collection.default_order()),
    });

    if pager.pagination().page_size != params.page_size {
        pager.reset(params.page_size)?;
    }

    let total = pager.total_count(Some(&params.filter)).await?;
    let pagination = Pagination {
        page: params.page,
        page_size: params.page_size,
        total: Some(total),
    };
    let page_number = pagination.clamp(params.page);
    let page = pager
        .fetch_page(page_number, params.page_size, Some(&params.filter))
        .await?;

    tracing::debug!(
        "{} listed {} page {} ({} rows)",
        claims.identity.email,
        collection,
        page.page,
        page.rows.len()
    );

    Ok(success_to_api_response(ListResponse {
        rows: page.rows.iter().map(|doc| collection.view(doc)).collect(),
        has_more: page.has_more,
        page: page.page,
        page_size: page.page_size,
        total,
        total_pages: pagination.total_pages().unwrap_or(1),
    }))
}

#[axum::debug_handler]
pub async fn count(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<CountResponse>>, AppError> {
    let collection = parse_collection(&name)?;
    let params = ListParams::parse(raw, &state.config)?;
    let total = state
        .store
        .count(collection.as_str(), &params.filter)
        .await?;
    Ok(success_to_api_response(CountResponse { total }))
}

#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let collection = parse_collection(&name)?;
    let doc = state
        .store
        .get(collection.as_str(), &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
    Ok(success_to_api_response(detail(&doc)))
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenPayload>,
    Path(name): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let collection = parse_collection(&name)?;
    if body.get(ID_FIELD).and_then(Value::as_str) == Some(RESERVED_ID) {
        return Err(AppError::Validation(format!("id {RESERVED_ID} is reserved")));
    }
    let mut data = prepare_write(collection, &claims, body)?;
    if collection == Collection::Users {
        if !data.contains_key(EMAIL_FIELD) {
            return Err(AppError::Validation("email is required".into()));
        }
        ensure_email_free(&state, &data, None).await?;
    }
    data.entry("created_at")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

    let doc = state.store.insert(collection.as_str(), data).await?;
    state.pagers.invalidate_collection(collection.as_str());
    tracing::info!("{} created {}/{}", claims.identity.email, collection, doc.id);
    Ok(success_to_api_response(detail(&doc)))
}

#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenPayload>,
    Path((name, id)): Path<(String, String)>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let collection = parse_collection(&name)?;
    let data = prepare_write(collection, &claims, body)?;
    if collection == Collection::Users {
        ensure_email_free(&state, &data, Some(&id)).await?;
    }
    let doc = state
        .store
        .update(collection.as_str(), &id, data)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
    state.pagers.invalidate_collection(collection.as_str());
    tracing::info!("{} updated {}/{}", claims.identity.email, collection, id);
    Ok(success_to_api_response(detail(&doc)))
}

#[axum::debug_handler]
pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenPayload>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<DeleteResponse>>, AppError> {
    let collection = parse_collection(&name)?;
    if collection == Collection::Users {
        require_superadmin(&claims)?;
    }
    if !state.store.delete(collection.as_str(), &id).await? {
        return Err(AppError::NotFound(format!("{collection}/{id}")));
    }
    state.pagers.invalidate_collection(collection.as_str());
    tracing::info!("{} deleted {}/{}", claims.identity.email, collection, id);
    Ok(success_to_api_response(DeleteResponse { deleted: true }))
}
