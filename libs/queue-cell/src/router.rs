use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{
    book_reservation, cancel_reservation, check_in, daily_status, get_check_in_window,
    get_policy, preview_policy, register_walk_in, reschedule_reservation, run_sweep,
    transition_examination, update_policy, update_priority, waiting_queue, QueueState,
};

pub fn queue_routes(state: QueueState) -> Router {
    let protected_routes = Router::new()
        .route("/policy", get(get_policy).put(update_policy))
        .route("/policy/preview", post(preview_policy))
        .route("/reservations", post(book_reservation))
        .route("/walk-ins", post(register_walk_in))
        .route("/reservations/{id}/check-in", post(check_in))
        .route("/reservations/{id}/check-in-window", get(get_check_in_window))
        .route("/reservations/{id}/examination", post(transition_examination))
        .route("/reservations/{id}/cancel", post(cancel_reservation))
        .route("/reservations/{id}/reschedule", patch(reschedule_reservation))
        .route("/reservations/{id}/priority", patch(update_priority))
        .route("/doctors/{doctor_id}/waiting", get(waiting_queue))
        .route("/daily-status/{schedule_id}/{date}", get(daily_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    let cron_routes = Router::new().route("/sweep", post(run_sweep));

    Router::new()
        .merge(protected_routes)
        .merge(cron_routes)
        .with_state(state)
}
