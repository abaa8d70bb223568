use axum::{
    Router,
    routing::get,
};

use queue_cell::{queue_routes, QueueState};

pub fn create_router(state: QueueState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .nest("/queue", queue_routes(state))
}
