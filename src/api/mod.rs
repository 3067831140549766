use crate::scenario::ScenarioProfile;
use crate::state::SharedState;
use axum::Router;
use axum::routing::{get, post};

pub mod handlers;
pub mod responses;
pub mod stream;

#[derive(Debug, Clone)]
pub struct ApiState {
    pub shared: SharedState,
    pub scenario_profile: ScenarioProfile,
}

pub fn router(api: ApiState) -> Router {
    Router::new()
        .route("/api/traffic", get(handlers::get_traffic))
        .route(
            "/api/scenario/{name}",
            get(handlers::trigger_scenario).post(handlers::trigger_scenario),
        )
        .route("/api/reset", get(handlers::reset).post(handlers::reset))
        .route("/api/schedule", post(handlers::run_schedule))
        .route("/api/fairness", get(handlers::get_fairness))
        .route("/ws", get(stream::subscribe))
        .with_state(api)
}
