use crate::api::ApiState;
use crate::api::responses::{
    ApiErrorCode, ErrorResponse, FairnessResponse, ResetResponse, ResponseStatus,
    ScenarioSuccessResponse, ScheduleResponse, TrafficResponse, format_timestamp,
};
use crate::control::{self, ControlError};
use crate::scenario::ScenarioError;
use crate::state::SharedState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub enum ApiResponse<T> {
    Success(T),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_traffic(State(api): State<ApiState>) -> impl IntoResponse {
    build_traffic_response(&api.shared)
}

pub async fn trigger_scenario(
    State(api): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    build_scenario_response(&api, &name, SystemTime::now())
}

pub async fn reset(State(api): State<ApiState>) -> impl IntoResponse {
    build_reset_response(&api.shared, SystemTime::now())
}

pub async fn run_schedule(State(api): State<ApiState>) -> impl IntoResponse {
    build_schedule_response(&api.shared, SystemTime::now())
}

pub async fn get_fairness(State(api): State<ApiState>) -> impl IntoResponse {
    build_fairness_response(&api.shared, SystemTime::now())
}

fn build_traffic_response(state: &SharedState) -> ApiResponse<TrafficResponse> {
    let snapshot = match control::get_state(state) {
        Ok(snapshot) => snapshot,
        Err(err) => return internal_error("/api/traffic", &err.to_string()),
    };
    match TrafficResponse::from_state(&snapshot) {
        Ok(body) => ApiResponse::Success(body),
        Err(_) => internal_error("/api/traffic", "timestamp formatting failure"),
    }
}

fn build_scenario_response(
    api: &ApiState,
    name: &str,
    now: SystemTime,
) -> ApiResponse<ScenarioSuccessResponse> {
    let applied = match control::apply_scenario_at(&api.shared, name, api.scenario_profile, now) {
        Ok(applied) => applied,
        Err(ControlError::Scenario(ScenarioError::Unknown(unknown))) => {
            info!(scenario = %unknown, "Rejected unknown scenario");
            return unknown_scenario_response(&unknown, now);
        }
        Err(err) => return internal_error("/api/scenario", &err.to_string()),
    };

    match TrafficResponse::from_state(&applied.state) {
        Ok(data) => ApiResponse::Success(ScenarioSuccessResponse {
            status: ResponseStatus::Success,
            scenario: name.to_string(),
            message: applied.message,
            data,
        }),
        Err(_) => internal_error("/api/scenario", "timestamp formatting failure"),
    }
}

fn unknown_scenario_response<T>(name: &str, now: SystemTime) -> ApiResponse<T> {
    match format_timestamp(now) {
        Ok(formatted) => ApiResponse::Error {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse {
                error_code: ApiErrorCode::UnknownScenario,
                error_message: format!("Unknown scenario: {name}"),
                timestamp: formatted,
            },
        },
        Err(_) => internal_error("/api/scenario", "timestamp formatting failure"),
    }
}

fn build_reset_response(state: &SharedState, now: SystemTime) -> ApiResponse<ResetResponse> {
    let restored = match control::reset_at(state, now) {
        Ok(restored) => restored,
        Err(err) => return internal_error("/api/reset", &err.to_string()),
    };
    match TrafficResponse::from_state(&restored) {
        Ok(data) => ApiResponse::Success(ResetResponse {
            status: ResponseStatus::Reset,
            data,
        }),
        Err(_) => internal_error("/api/reset", "timestamp formatting failure"),
    }
}

fn build_schedule_response(state: &SharedState, now: SystemTime) -> ApiResponse<ScheduleResponse> {
    let decisions = match control::run_scheduling_cycle_at(state, now) {
        Ok(decisions) => decisions,
        Err(err) => return internal_error("/api/schedule", &err.to_string()),
    };
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success(ScheduleResponse {
            decisions,
            timestamp,
        }),
        Err(_) => internal_error("/api/schedule", "timestamp formatting failure"),
    }
}

fn build_fairness_response(state: &SharedState, now: SystemTime) -> ApiResponse<FairnessResponse> {
    let report = match control::get_fairness_report(state) {
        Ok(report) => report,
        Err(err) => return internal_error("/api/fairness", &err.to_string()),
    };
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success(FairnessResponse { report, timestamp }),
        Err(_) => internal_error("/api/fairness", "timestamp formatting failure"),
    }
}

fn internal_error<T>(endpoint: &str, message: &str) -> ApiResponse<T> {
    error!(
        endpoint = endpoint,
        message = message,
        "Internal error while handling request"
    );
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ApiErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}
