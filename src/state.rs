use crate::error::AppError;
use crate::scenario::Notification;
use crate::scheduler::FairnessScheduler;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::trace;

pub type SegmentId = u32;

pub type SharedState = Arc<RwLock<AppState>>;

/// Buffered messages per subscriber before a slow receiver starts lagging.
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

const LOW_CONGESTION_LIMIT: u32 = 10;
const MEDIUM_CONGESTION_LIMIT: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightColor {
    Red,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CongestionTier {
    Low,
    Medium,
    High,
    /// Only reachable through a scenario override.
    VeryHigh,
}

impl CongestionTier {
    pub fn from_vehicle_count(vehicle_count: u32) -> Self {
        if vehicle_count < LOW_CONGESTION_LIMIT {
            Self::Low
        } else if vehicle_count < MEDIUM_CONGESTION_LIMIT {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub vehicle_count: u32,
    pub pedestrian_count: u32,
    /// Seconds accrued while red. Never decremented by the simulator.
    pub waiting_time: u32,
    pub light: LightColor,
    pub congestion_tier: CongestionTier,
}

impl Segment {
    pub fn new(
        vehicle_count: u32,
        pedestrian_count: u32,
        waiting_time: u32,
        light: LightColor,
    ) -> Self {
        Self {
            vehicle_count,
            pedestrian_count,
            waiting_time,
            light,
            congestion_tier: CongestionTier::from_vehicle_count(vehicle_count),
        }
    }
}

/// Partial update applied atomically to a single segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentUpdate {
    pub vehicle_count: Option<u32>,
    pub pedestrian_count: Option<u32>,
    pub waiting_time: Option<u32>,
    pub light: Option<LightColor>,
    pub congestion_tier: Option<CongestionTier>,
}

impl SegmentUpdate {
    fn apply_to(&self, segment: &mut Segment) {
        if let Some(vehicle_count) = self.vehicle_count {
            segment.vehicle_count = vehicle_count;
        }
        if let Some(pedestrian_count) = self.pedestrian_count {
            segment.pedestrian_count = pedestrian_count;
        }
        if let Some(waiting_time) = self.waiting_time {
            segment.waiting_time = waiting_time;
        }
        if let Some(light) = self.light {
            segment.light = light;
        }
        if let Some(congestion_tier) = self.congestion_tier {
            segment.congestion_tier = congestion_tier;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectionState {
    pub segments: BTreeMap<SegmentId, Segment>,
    pub emergency: bool,
    pub vip_mode: bool,
    pub timestamp: SystemTime,
}

impl IntersectionState {
    /// The fixed four-approach layout every run and every reset starts from.
    pub fn initial(timestamp: SystemTime) -> Self {
        let segments = BTreeMap::from([
            (1, Segment::new(5, 2, 0, LightColor::Red)),
            (2, Segment::new(12, 0, 15, LightColor::Green)),
            (3, Segment::new(8, 5, 25, LightColor::Red)),
            (4, Segment::new(20, 0, 40, LightColor::Red)),
        ]);
        Self {
            segments,
            emergency: false,
            vip_mode: false,
            timestamp,
        }
    }

    pub fn set_segment_fields(
        &mut self,
        id: SegmentId,
        update: &SegmentUpdate,
    ) -> Result<(), AppError> {
        let segment = self
            .segments
            .get_mut(&id)
            .ok_or(AppError::UnknownSegment(id))?;
        update.apply_to(segment);
        Ok(())
    }
}

#[derive(Debug)]
pub struct AppState {
    intersection: IntersectionState,
    scheduler: FairnessScheduler,
    updates_tx: broadcast::Sender<IntersectionState>,
    notifications_tx: broadcast::Sender<Notification>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_timestamp(SystemTime::now())
    }

    pub fn with_timestamp(timestamp: SystemTime) -> Self {
        let (updates_tx, _updates_rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (notifications_tx, _notifications_rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            intersection: IntersectionState::initial(timestamp),
            scheduler: FairnessScheduler::new(),
            updates_tx,
            notifications_tx,
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    pub fn intersection(&self) -> &IntersectionState {
        &self.intersection
    }

    pub fn intersection_mut(&mut self) -> &mut IntersectionState {
        &mut self.intersection
    }

    pub fn segments(&self) -> &BTreeMap<SegmentId, Segment> {
        &self.intersection.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.intersection.segments.get(&id)
    }

    pub fn set_segment_fields(
        &mut self,
        id: SegmentId,
        update: &SegmentUpdate,
    ) -> Result<(), AppError> {
        self.intersection.set_segment_fields(id, update)
    }

    pub fn scheduler(&self) -> &FairnessScheduler {
        &self.scheduler
    }

    /// Split borrow for a scheduling cycle that reads segments and writes history.
    pub fn parts_mut(&mut self) -> (&mut IntersectionState, &mut FairnessScheduler) {
        (&mut self.intersection, &mut self.scheduler)
    }

    /// Restores the initial layout and forgets every fairness credit.
    pub fn reset(&mut self, now: SystemTime) {
        self.intersection = IntersectionState::initial(now);
        self.scheduler.reset();
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<IntersectionState> {
        self.updates_tx.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications_tx.subscribe()
    }

    pub fn publish_update(&self) {
        if self.updates_tx.send(self.intersection.clone()).is_err() {
            trace!("No update subscribers");
        }
    }

    pub fn publish_notification(&self, notification: Notification) {
        if self.notifications_tx.send(notification).is_err() {
            trace!("No notification subscribers");
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
