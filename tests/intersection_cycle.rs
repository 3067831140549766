use signal_equity::control::{self, ControlError};
use signal_equity::scenario::{ScenarioError, ScenarioProfile};
use signal_equity::scheduler::DecisionReason;
use signal_equity::simulation::{SimulationSettings, TelemetrySimulator, run_tick};
use signal_equity::state::{AppState, CongestionTier, IntersectionState, LightColor};
use std::time::{Duration, UNIX_EPOCH};

fn quiet_simulator() -> TelemetrySimulator {
    TelemetrySimulator::new(&SimulationSettings {
        vehicle_delta_min: 0,
        vehicle_delta_max: 0,
        seed: Some(1),
        ..SimulationSettings::default()
    })
}

#[test]
fn pedestrian_surge_keeps_crosswalk_red_across_cycles() -> Result<(), ControlError> {
    let state = AppState::with_timestamp(UNIX_EPOCH).into_shared();
    let mut simulator = quiet_simulator();

    control::apply_scenario(&state, "pedestrians", ScenarioProfile::Full)?;

    for _ in 0..5 {
        run_tick(&state, &mut simulator)?;
        let decisions = control::run_scheduling_cycle(&state)?;

        assert_eq!(decisions[&3].reason, DecisionReason::UrgentPedestrian);
        assert_eq!(decisions[&3].light, LightColor::Red);
        let greens = decisions
            .values()
            .filter(|d| d.light == LightColor::Green)
            .count();
        assert_eq!(greens, 2);
    }

    let report = control::get_fairness_report(&state)?;
    assert!(!report.contains_key(&3));
    let total: i32 = report.values().map(|entry| entry.green_cycles).sum();
    assert!(total > 0);
    Ok(())
}

#[test]
fn surge_override_is_recomputed_on_next_tick() -> Result<(), ControlError> {
    let state = AppState::with_timestamp(UNIX_EPOCH).into_shared();
    let mut simulator = quiet_simulator();

    let applied = control::apply_scenario(&state, "match", ScenarioProfile::Full)?;
    assert_eq!(applied.state.segments[&4].congestion_tier, CongestionTier::VeryHigh);

    run_tick(&state, &mut simulator)?;

    let snapshot = control::get_state(&state)?;
    assert_eq!(snapshot.segments[&4].vehicle_count, 45);
    assert_eq!(snapshot.segments[&4].congestion_tier, CongestionTier::High);
    Ok(())
}

#[test]
fn waiting_time_is_not_reset_by_green() -> Result<(), ControlError> {
    let state = AppState::with_timestamp(UNIX_EPOCH).into_shared();
    let mut simulator = quiet_simulator();

    control::run_scheduling_cycle(&state)?;
    run_tick(&state, &mut simulator)?;

    // Segment 4 went green with 40s of waiting and keeps it while green.
    let snapshot = control::get_state(&state)?;
    assert_eq!(snapshot.segments[&4].light, LightColor::Green);
    assert_eq!(snapshot.segments[&4].waiting_time, 40);
    Ok(())
}

#[test]
fn subscribers_see_ticks_and_scenarios_but_not_rejections() -> Result<(), ControlError> {
    let state = AppState::with_timestamp(UNIX_EPOCH).into_shared();
    let mut simulator = quiet_simulator();
    let mut updates = control::subscribe_to_updates(&state)?;

    run_tick(&state, &mut simulator)?;
    let rejected = control::apply_scenario(&state, "fireworks", ScenarioProfile::Full);
    control::apply_scenario(&state, "vip", ScenarioProfile::Minimal)?;

    assert!(matches!(
        rejected,
        Err(ControlError::Scenario(ScenarioError::Unknown(_)))
    ));
    let tick = updates.try_recv().expect("tick snapshot");
    let vip = updates.try_recv().expect("scenario snapshot");
    assert!(!tick.vip_mode);
    assert!(vip.vip_mode);
    assert_eq!(vip.segments[&2].vehicle_count, 2);
    assert!(updates.try_recv().is_err());
    Ok(())
}

#[test]
fn reset_restores_initial_layout_after_activity() -> Result<(), ControlError> {
    let state = AppState::with_timestamp(UNIX_EPOCH).into_shared();
    let mut simulator = quiet_simulator();
    for name in ["match", "pedestrians", "vip"] {
        control::apply_scenario(&state, name, ScenarioProfile::Full)?;
    }
    run_tick(&state, &mut simulator)?;
    control::run_scheduling_cycle(&state)?;

    let now = UNIX_EPOCH + Duration::from_secs(600);
    let restored = control::reset_at(&state, now)?;

    assert_eq!(restored, IntersectionState::initial(now));
    assert!(control::get_fairness_report(&state)?.is_empty());
    Ok(())
}
