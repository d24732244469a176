//! Route definitions for the `/results` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::results;
use crate::state::AppState;

/// Routes mounted at `/results`.
///
/// ```text
/// GET    /                -> list_results
/// POST   /                -> create_result
/// GET    /new             -> new_result
/// GET    /{id}            -> get_result   (JSON, or CSV via Accept / ?format=csv)
/// POST   /{id}/retry      -> retry_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(results::list_results).post(results::create_result))
        .route("/new", get(results::new_result))
        .route("/{id}", get(results::get_result))
        .route("/{id}/retry", post(results::retry_result))
}
