mod v1;

use utoipa_axum::router::OpenApiRouter;

use crate::state::AppState;

/// Versioned API surface, mounted under `/api` by the router builder.
pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1::routes())
}
