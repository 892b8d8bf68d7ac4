use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{AppState, error::AppError, token::TokenPayload};

/// Route guard for everything behind login. Invalid and expired tokens get the
/// same 401 so the client drops its stored token either way.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(AppError::Unauthorized);
    };

    match state.codec.decode(bearer.token()) {
        Ok(payload) => {
            req.extensions_mut().insert(payload);
            Ok(next.run(req).await)
        }
        Err(rejection) => {
            tracing::warn!("rejected token on {}: {}", req.uri().path(), rejection);
            Err(AppError::Unauthorized)
        }
    }
}

pub fn require_superadmin(claims: &TokenPayload) -> Result<(), AppError> {
    if claims.identity.is_superadmin {
        Ok(())
    } else {
        tracing::warn!("{} attempted a superadmin action", claims.identity.email);
        Err(AppError::PermissionDenied)
    }
}
