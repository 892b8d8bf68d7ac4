use axum::extract::{Extension, Json, State};

use super::model::{LoginRequest, LoginResponse};
use crate::{
    AppState,
    error::AppError,
    store::{Filter, ID_FIELD, OrderBy, Query},
    token::{Identity, TokenPayload},
    utils::{ApiResponse, success_to_api_response, verify_password},
    views::Collection,
};

const ADMIN_ROLE: &str = "admin";

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("email and password are required".into()));
    }

    let query = Query::new(Collection::Users.as_str(), OrderBy::asc(ID_FIELD))
        .filter(Filter::new().eq("email", email.clone()))
        .limit(1);
    let Some(user) = state.store.query(&query).await?.into_iter().next() else {
        tracing::info!("login for unknown account {}", email);
        return Err(AppError::InvalidCredentials);
    };

    let Some(hash) = user.str_field("password_hash") else {
        tracing::warn!("account {} has no password set", email);
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&req.password, hash)? {
        tracing::info!("wrong password for {}", email);
        return Err(AppError::InvalidCredentials);
    }

    let identity = Identity {
        email,
        role: user.str_field("role").unwrap_or_default().to_string(),
        first_name: user.str_field("first_name").unwrap_or_default().to_string(),
        last_name: user.str_field("last_name").unwrap_or_default().to_string(),
        is_superadmin: user.field("is_superadmin").as_bool().unwrap_or(false),
    };
    if identity.role != ADMIN_ROLE && !identity.is_superadmin {
        tracing::warn!("{} is not an admin, login refused", identity.email);
        return Err(AppError::PermissionDenied);
    }

    let issued = state
        .codec
        .encode(&identity, state.config.token_expiration_secs)?;
    tracing::info!("{} logged in", identity.email);

    Ok(success_to_api_response(LoginResponse {
        token: issued.token,
        exp: issued.exp,
        identity,
    }))
}

#[axum::debug_handler(state = AppState)]
pub async fn me(Extension(claims): Extension<TokenPayload>) -> Json<ApiResponse<TokenPayload>> {
    success_to_api_response(claims)
}

/// The client discards its token; here only the caller's list caches go.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenPayload>,
) -> Json<ApiResponse<()>> {
    state.pagers.drop_owner(&claims.identity.email);
    tracing::info!("{} logged out", claims.identity.email);
    success_to_api_response(())
}
