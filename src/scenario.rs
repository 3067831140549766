use crate::state::{CongestionTier, IntersectionState, LightColor, SegmentId, SegmentUpdate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const STADIUM_SEGMENT: SegmentId = 4;
const CROSSWALK_SEGMENT: SegmentId = 3;
const CORRIDOR_SEGMENT: SegmentId = 2;

const SURGE_VEHICLE_COUNT: u32 = 45;
const CROWD_PEDESTRIAN_COUNT: u32 = 15;
const CORRIDOR_VEHICLE_COUNT: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("unknown scenario: {0}")]
    Unknown(String),
    #[error("scenario {scenario} targets missing segment {segment_id}")]
    MissingSegment {
        scenario: Scenario,
        segment_id: SegmentId,
    },
}

/// Which flavour of the scenario overrides to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioProfile {
    /// Surge forces very-high congestion; the VIP corridor keeps its traffic.
    #[default]
    Full,
    /// Surge forces high congestion; the VIP corridor is emptied to two cars.
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Match,
    Pedestrians,
    Vip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl Scenario {
    pub fn name(self) -> &'static str {
        match self {
            Scenario::Match => "match",
            Scenario::Pedestrians => "pedestrians",
            Scenario::Vip => "vip",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Scenario::Match => "Match scenario: traffic surge towards the stadium",
            Scenario::Pedestrians => "Pedestrian scenario: crossing has priority",
            Scenario::Vip => "VIP scenario: green corridor activated",
        }
    }

    fn updates(self, profile: ScenarioProfile) -> (SegmentId, SegmentUpdate) {
        match self {
            Scenario::Match => {
                let tier = match profile {
                    ScenarioProfile::Full => CongestionTier::VeryHigh,
                    ScenarioProfile::Minimal => CongestionTier::High,
                };
                (
                    STADIUM_SEGMENT,
                    SegmentUpdate {
                        vehicle_count: Some(SURGE_VEHICLE_COUNT),
                        congestion_tier: Some(tier),
                        ..SegmentUpdate::default()
                    },
                )
            }
            Scenario::Pedestrians => (
                CROSSWALK_SEGMENT,
                SegmentUpdate {
                    pedestrian_count: Some(CROWD_PEDESTRIAN_COUNT),
                    light: Some(LightColor::Red),
                    ..SegmentUpdate::default()
                },
            ),
            Scenario::Vip => {
                let vehicle_count = match profile {
                    ScenarioProfile::Full => None,
                    ScenarioProfile::Minimal => Some(CORRIDOR_VEHICLE_COUNT),
                };
                (
                    CORRIDOR_SEGMENT,
                    SegmentUpdate {
                        light: Some(LightColor::Green),
                        vehicle_count,
                        ..SegmentUpdate::default()
                    },
                )
            }
        }
    }

    /// Overrides the intersection directly, bypassing the scheduler.
    ///
    /// The timestamp is left to the caller so a failed apply changes nothing.
    pub fn apply(
        self,
        profile: ScenarioProfile,
        intersection: &mut IntersectionState,
    ) -> Result<Notification, ScenarioError> {
        let (segment_id, update) = self.updates(profile);
        intersection
            .set_segment_fields(segment_id, &update)
            .map_err(|_| ScenarioError::MissingSegment {
                scenario: self,
                segment_id,
            })?;
        if self == Scenario::Vip {
            intersection.vip_mode = true;
        }
        Ok(Notification {
            kind: self.name().to_string(),
            message: self.message().to_string(),
        })
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "match" => Ok(Scenario::Match),
            "pedestrians" => Ok(Scenario::Pedestrians),
            "vip" => Ok(Scenario::Vip),
            other => Err(ScenarioError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
