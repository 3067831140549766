use crate::scenario::Notification;
use crate::scheduler::LightDecision;
use crate::scheduler::report::FairnessEntry;
use crate::state::{CongestionTier, IntersectionState, LightColor, Segment, SegmentId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug)]
pub enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

/// Segment as the dashboard expects it.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SegmentResponse {
    pub cars: u32,
    pub pedestrians: u32,
    pub waiting_time: u32,
    pub light: LightColor,
    pub congestion: CongestionTier,
}

impl From<&Segment> for SegmentResponse {
    fn from(segment: &Segment) -> Self {
        Self {
            cars: segment.vehicle_count,
            pedestrians: segment.pedestrian_count,
            waiting_time: segment.waiting_time,
            light: segment.light,
            congestion: segment.congestion_tier,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TrafficResponse {
    pub segments: BTreeMap<SegmentId, SegmentResponse>,
    pub emergency: bool,
    pub vip_mode: bool,
    pub timestamp: String,
}

impl TrafficResponse {
    pub fn from_state(state: &IntersectionState) -> Result<Self, TimestampError> {
        Ok(Self {
            segments: state
                .segments
                .iter()
                .map(|(&id, segment)| (id, SegmentResponse::from(segment)))
                .collect(),
            emergency: state.emergency,
            vip_mode: state.vip_mode,
            timestamp: format_timestamp(state.timestamp)?,
        })
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Reset,
}

#[derive(Debug, Serialize)]
pub struct ScenarioSuccessResponse {
    pub status: ResponseStatus,
    pub scenario: String,
    pub message: String,
    pub data: TrafficResponse,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: ResponseStatus,
    pub data: TrafficResponse,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub decisions: BTreeMap<SegmentId, LightDecision>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct FairnessResponse {
    pub report: BTreeMap<SegmentId, FairnessEntry>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ApiErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    UnknownScenario,
    InternalError,
}

pub const CONNECTED_MESSAGE: &str = "Connected to traffic server";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConnectedPayload {
    pub data: String,
}

/// Frames pushed over the WebSocket stream.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Greeting sent once, right after the upgrade.
    Connected(ConnectedPayload),
    TrafficUpdate(TrafficResponse),
    Notification(Notification),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::DecisionReason;
    use serde_json::json;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn traffic_response_uses_dashboard_field_names() {
        let state = IntersectionState::initial(UNIX_EPOCH + Duration::from_secs(1));

        let response = TrafficResponse::from_state(&state).expect("format state");
        let value = serde_json::to_value(response).expect("serialize traffic response");

        assert_eq!(
            value["segments"]["4"],
            json!({
                "cars": 20,
                "pedestrians": 0,
                "waiting_time": 40,
                "light": "red",
                "congestion": "medium"
            })
        );
        assert_eq!(value["vip_mode"], json!(false));
        assert_eq!(value["timestamp"], json!("1970-01-01T00:00:01Z"));
    }

    #[test]
    fn very_high_congestion_is_kebab_case() {
        let value = serde_json::to_value(CongestionTier::VeryHigh).expect("serialize tier");
        assert_eq!(value, json!("very-high"));
    }

    #[test]
    fn schedule_response_serializes_reason() {
        let response = ScheduleResponse {
            decisions: BTreeMap::from([(
                3,
                LightDecision {
                    segment_id: 3,
                    light: LightColor::Red,
                    duration_secs: 30,
                    reason: DecisionReason::UrgentPedestrian,
                },
            )]),
            timestamp: "2026-01-11T12:30:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize schedule response");
        assert_eq!(
            value,
            json!({
                "decisions": {
                    "3": {
                        "segment_id": 3,
                        "light": "red",
                        "duration_secs": 30,
                        "reason": "urgent-pedestrian"
                    }
                },
                "timestamp": "2026-01-11T12:30:00Z"
            })
        );
    }

    #[test]
    fn error_response_uses_screaming_snake_case_code() {
        let response = ErrorResponse {
            error_code: ApiErrorCode::UnknownScenario,
            error_message: "unknown scenario: parade".to_string(),
            timestamp: "2026-01-11T12:32:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(
            value,
            json!({
                "error_code": "UNKNOWN_SCENARIO",
                "error_message": "unknown scenario: parade",
                "timestamp": "2026-01-11T12:32:00Z"
            })
        );
    }

    #[test]
    fn stream_event_is_tagged() {
        let event = StreamEvent::Notification(Notification {
            kind: "pedestrians".to_string(),
            message: "crossing".to_string(),
        });

        let value = serde_json::to_value(event).expect("serialize stream event");
        assert_eq!(
            value,
            json!({
                "event": "notification",
                "data": {"type": "pedestrians", "message": "crossing"}
            })
        );
    }

    #[test]
    fn connected_event_greets_new_clients() {
        let event = StreamEvent::Connected(ConnectedPayload {
            data: CONNECTED_MESSAGE.to_string(),
        });

        let value = serde_json::to_value(event).expect("serialize connected event");
        assert_eq!(
            value,
            json!({
                "event": "connected",
                "data": {"data": "Connected to traffic server"}
            })
        );
    }
}
