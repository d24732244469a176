pub mod health;
pub mod results;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /results    weather results (list, new, create, show, retry)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/results", results::router())
}
