mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_tests))
        .route("/:test_id", get(handlers::get_test))
        .route("/:test_id/submit", post(handlers::submit_test))
        .route("/:test_id/assets/*asset_path", get(handlers::view_asset))
}
