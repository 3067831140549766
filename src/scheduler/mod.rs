//! Fairness-aware light scheduling.
//!
//! A cycle first forces crowded crossings to red, then scores the remaining
//! segments on waiting time, load, and how little green they have had
//! recently. The two best scores get green, everybody else rotates to red.

use crate::state::{IntersectionState, LightColor, Segment, SegmentId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::debug;

pub mod report;

pub const URGENT_PEDESTRIAN_THRESHOLD: u32 = 10;
pub const RED_DURATION_SECS: u32 = 30;
pub const GREEN_DURATION_SECS: u32 = 45;
pub const GREEN_SLOTS: usize = 2;

const WAITING_WEIGHT: u32 = 2;
const WAITING_SCORE_CAP: u32 = 50;
const VEHICLE_SCORE_CAP: u32 = 30;
const CREDIT_SCORE_CAP: i32 = 20;

/// Green credits per segment. Entries appear the first time a segment is scored.
pub type FairnessHistory = BTreeMap<SegmentId, i32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    UrgentPedestrian,
    Equity,
    Rotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightDecision {
    pub segment_id: SegmentId,
    pub light: LightColor,
    pub duration_secs: u32,
    pub reason: DecisionReason,
}

impl LightDecision {
    fn urgent(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            light: LightColor::Red,
            duration_secs: RED_DURATION_SECS,
            reason: DecisionReason::UrgentPedestrian,
        }
    }

    fn equity(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            light: LightColor::Green,
            duration_secs: GREEN_DURATION_SECS,
            reason: DecisionReason::Equity,
        }
    }

    fn rotation(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            light: LightColor::Red,
            duration_secs: RED_DURATION_SECS,
            reason: DecisionReason::Rotation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub decisions: BTreeMap<SegmentId, LightDecision>,
    pub history: FairnessHistory,
}

pub fn fairness_score(segment: &Segment, credit: i32) -> i64 {
    let waiting = segment
        .waiting_time
        .saturating_mul(WAITING_WEIGHT)
        .min(WAITING_SCORE_CAP);
    let load = segment.vehicle_count.min(VEHICLE_SCORE_CAP);
    let history = CREDIT_SCORE_CAP.saturating_sub(credit.min(CREDIT_SCORE_CAP));
    i64::from(waiting) + i64::from(load) + i64::from(history)
}

/// Computes one cycle of light decisions without touching any shared state.
///
/// Equal scores keep ascending key order, so the lowest segment id wins a tie.
pub fn schedule(
    segments: &BTreeMap<SegmentId, Segment>,
    history: &FairnessHistory,
) -> ScheduleOutcome {
    let mut decisions = BTreeMap::new();
    let mut history = history.clone();

    for (&id, segment) in segments {
        if segment.pedestrian_count > URGENT_PEDESTRIAN_THRESHOLD {
            decisions.insert(id, LightDecision::urgent(id));
        }
    }

    let mut scored: Vec<(SegmentId, i64)> = segments
        .iter()
        .filter(|(id, _)| !decisions.contains_key(*id))
        .map(|(&id, segment)| {
            let credit = *history.entry(id).or_insert(0);
            (id, fairness_score(segment, credit))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    for &(id, score) in scored.iter().take(GREEN_SLOTS) {
        debug!(segment_id = id, score, "Granting equity green");
        decisions.insert(id, LightDecision::equity(id));
        let credit = history.entry(id).or_insert(0);
        *credit = credit.saturating_add(1);
    }

    for &id in segments.keys() {
        if decisions.contains_key(&id) {
            continue;
        }
        decisions.insert(id, LightDecision::rotation(id));
        if let Some(credit) = history.get_mut(&id)
            && *credit > 0
        {
            *credit -= 1;
        }
    }

    ScheduleOutcome { decisions, history }
}

/// Writes decided lights back into the intersection.
///
/// Waiting time is left alone on green; only the simulator touches it.
pub fn apply_decisions(
    intersection: &mut IntersectionState,
    decisions: &BTreeMap<SegmentId, LightDecision>,
    now: SystemTime,
) {
    for (id, decision) in decisions {
        if let Some(segment) = intersection.segments.get_mut(id) {
            segment.light = decision.light;
        }
    }
    intersection.timestamp = now;
}

/// Owns the fairness history between cycles.
#[derive(Debug, Default)]
pub struct FairnessScheduler {
    history: FairnessHistory,
}

impl FairnessScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &FairnessHistory {
        &self.history
    }

    pub fn run_cycle(
        &mut self,
        segments: &BTreeMap<SegmentId, Segment>,
    ) -> BTreeMap<SegmentId, LightDecision> {
        let outcome = schedule(segments, &self.history);
        self.history = outcome.history;
        outcome.decisions
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
