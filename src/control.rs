//! Operations the transport layer calls into.
//!
//! Each operation takes exactly one guard on the shared state, so readers
//! never observe a half-applied tick, scenario, or scheduling cycle.

use crate::error::AppError;
use crate::scenario::{Notification, Scenario, ScenarioError, ScenarioProfile};
use crate::scheduler::report::{FairnessEntry, fairness_report};
use crate::scheduler::{LightDecision, apply_decisions};
use crate::state::{IntersectionState, SegmentId, SharedState};
use std::collections::BTreeMap;
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    State(#[from] AppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioApplied {
    pub message: String,
    pub state: IntersectionState,
}

pub fn get_state(state: &SharedState) -> Result<IntersectionState, AppError> {
    let guard = state.read().map_err(|_| AppError::StateLock)?;
    Ok(guard.intersection().clone())
}

pub fn apply_scenario(
    state: &SharedState,
    name: &str,
    profile: ScenarioProfile,
) -> Result<ScenarioApplied, ControlError> {
    apply_scenario_at(state, name, profile, SystemTime::now())
}

pub fn apply_scenario_at(
    state: &SharedState,
    name: &str,
    profile: ScenarioProfile,
    now: SystemTime,
) -> Result<ScenarioApplied, ControlError> {
    let scenario: Scenario = name.parse()?;
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;

    // Work on a copy so a failed override never leaks partial writes.
    let mut next = guard.intersection().clone();
    let notification = scenario.apply(profile, &mut next)?;
    next.timestamp = now;
    *guard.intersection_mut() = next;

    guard.publish_update();
    guard.publish_notification(notification.clone());
    info!(scenario = %scenario, ?profile, "Scenario applied");

    Ok(ScenarioApplied {
        message: notification.message,
        state: guard.intersection().clone(),
    })
}

pub fn reset(state: &SharedState) -> Result<IntersectionState, AppError> {
    reset_at(state, SystemTime::now())
}

pub fn reset_at(state: &SharedState, now: SystemTime) -> Result<IntersectionState, AppError> {
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    guard.reset(now);
    info!("Intersection reset to initial layout");
    Ok(guard.intersection().clone())
}

pub fn run_scheduling_cycle(
    state: &SharedState,
) -> Result<BTreeMap<SegmentId, LightDecision>, AppError> {
    run_scheduling_cycle_at(state, SystemTime::now())
}

pub fn run_scheduling_cycle_at(
    state: &SharedState,
    now: SystemTime,
) -> Result<BTreeMap<SegmentId, LightDecision>, AppError> {
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    let (intersection, scheduler) = guard.parts_mut();
    let decisions = scheduler.run_cycle(&intersection.segments);
    apply_decisions(intersection, &decisions, now);
    Ok(decisions)
}

/// Snapshots emitted from the next tick or scenario onwards; nothing is replayed.
pub fn subscribe_to_updates(
    state: &SharedState,
) -> Result<broadcast::Receiver<IntersectionState>, AppError> {
    let guard = state.read().map_err(|_| AppError::StateLock)?;
    Ok(guard.subscribe_updates())
}

pub fn subscribe_notifications(
    state: &SharedState,
) -> Result<broadcast::Receiver<Notification>, AppError> {
    let guard = state.read().map_err(|_| AppError::StateLock)?;
    Ok(guard.subscribe_notifications())
}

pub fn get_fairness_report(
    state: &SharedState,
) -> Result<BTreeMap<SegmentId, FairnessEntry>, AppError> {
    let guard = state.read().map_err(|_| AppError::StateLock)?;
    Ok(fairness_report(guard.scheduler().history()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppState, LightColor};
    use std::time::{Duration, UNIX_EPOCH};

    fn shared() -> SharedState {
        AppState::with_timestamp(UNIX_EPOCH).into_shared()
    }

    #[test]
    fn unknown_scenario_leaves_state_identical() -> Result<(), AppError> {
        let state = shared();
        let mut updates = subscribe_to_updates(&state)?;
        let before = get_state(&state)?;

        let result = apply_scenario(&state, "nonexistent", ScenarioProfile::Full);

        assert!(matches!(
            result,
            Err(ControlError::Scenario(ScenarioError::Unknown(ref name))) if name == "nonexistent"
        ));
        assert_eq!(get_state(&state)?, before);
        assert!(updates.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn scenario_stamps_and_broadcasts() -> Result<(), ControlError> {
        let state = shared();
        let mut updates = subscribe_to_updates(&state)?;
        let mut notifications = subscribe_notifications(&state)?;
        let now = UNIX_EPOCH + Duration::from_secs(12);

        let applied = apply_scenario_at(&state, "vip", ScenarioProfile::Full, now)?;

        assert!(applied.state.vip_mode);
        assert_eq!(applied.state.segments[&2].light, LightColor::Green);
        assert_eq!(applied.state.timestamp, now);
        assert_eq!(updates.try_recv().expect("update"), applied.state);
        let notification = notifications.try_recv().expect("notification");
        assert_eq!(notification.kind, "vip");
        assert_eq!(notification.message, applied.message);
        Ok(())
    }

    #[test]
    fn scheduling_cycle_applies_lights() -> Result<(), AppError> {
        let state = shared();
        let now = UNIX_EPOCH + Duration::from_secs(1);

        let decisions = run_scheduling_cycle_at(&state, now)?;

        // Initial scores: 1 → 25, 2 → 62, 3 → 78, 4 → 90.
        let snapshot = get_state(&state)?;
        assert_eq!(decisions.len(), 4);
        assert_eq!(snapshot.segments[&4].light, LightColor::Green);
        assert_eq!(snapshot.segments[&3].light, LightColor::Green);
        assert_eq!(snapshot.segments[&2].light, LightColor::Red);
        assert_eq!(snapshot.segments[&1].light, LightColor::Red);
        assert_eq!(snapshot.timestamp, now);

        let report = get_fairness_report(&state)?;
        assert_eq!(report[&3].green_cycles, 1);
        assert_eq!(report[&3].percentage, 50.0);
        assert_eq!(report[&1].percentage, 0.0);
        Ok(())
    }

    #[test]
    fn reset_clears_everything() -> Result<(), ControlError> {
        let state = shared();
        apply_scenario(&state, "match", ScenarioProfile::Full)?;
        run_scheduling_cycle(&state)?;
        let now = UNIX_EPOCH + Duration::from_secs(99);

        let restored = reset_at(&state, now)?;

        assert_eq!(restored, IntersectionState::initial(now));
        assert!(get_fairness_report(&state)?.is_empty());
        Ok(())
    }

    #[test]
    fn poisoned_lock_surfaces_state_error() {
        let state = shared();
        let state_for_thread = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = state_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();

        assert!(matches!(get_state(&state), Err(AppError::StateLock)));
        assert!(matches!(
            apply_scenario(&state, "vip", ScenarioProfile::Full),
            Err(ControlError::State(AppError::StateLock))
        ));
    }
}
