pub mod auth;
pub mod collection;

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
};

/// All API routes nested under the configured base URI, state attached.
/// Rate limiting and CORS are layered on by the binary.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new().route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/admin/{collection}",
            get(collection::list).post(collection::create),
        )
        .route("/admin/{collection}/count", get(collection::count))
        .route(
            "/admin/{collection}/{id}",
            get(collection::get_one)
                .put(collection::update)
                .delete(collection::remove),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest(
            &state.config.api_base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
