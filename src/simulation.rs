//! Periodic telemetry simulation.
//!
//! Vehicle counts drift by a bounded random step every tick, congestion is
//! re-derived from the new count, and red segments accrue waiting time.

use crate::control;
use crate::error::AppError;
use crate::state::{CongestionTier, IntersectionState, LightColor, SharedState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub tick_interval: Duration,
    pub vehicle_delta_min: i32,
    pub vehicle_delta_max: i32,
    pub red_wait_increment: u32,
    pub seed: Option<u64>,
    pub schedule_interval: Option<Duration>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3),
            vehicle_delta_min: -3,
            vehicle_delta_max: 5,
            red_wait_increment: 3,
            seed: None,
            schedule_interval: None,
        }
    }
}

#[derive(Debug)]
pub struct TelemetrySimulator {
    rng: ChaCha8Rng,
    vehicle_delta_min: i32,
    vehicle_delta_max: i32,
    red_wait_increment: u32,
}

impl TelemetrySimulator {
    pub fn new(settings: &SimulationSettings) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            vehicle_delta_min: settings.vehicle_delta_min.min(settings.vehicle_delta_max),
            vehicle_delta_max: settings.vehicle_delta_max.max(settings.vehicle_delta_min),
            red_wait_increment: settings.red_wait_increment,
        }
    }

    /// Advances every segment by one tick and stamps the intersection.
    pub fn advance(&mut self, intersection: &mut IntersectionState, now: SystemTime) {
        for segment in intersection.segments.values_mut() {
            let delta = self
                .rng
                .gen_range(self.vehicle_delta_min..=self.vehicle_delta_max);
            let next = i64::from(segment.vehicle_count) + i64::from(delta);
            segment.vehicle_count = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
            segment.congestion_tier = CongestionTier::from_vehicle_count(segment.vehicle_count);

            if segment.light == LightColor::Red {
                segment.waiting_time = segment.waiting_time.saturating_add(self.red_wait_increment);
            }
        }
        intersection.timestamp = now;
    }
}

/// One simulator tick under a single write guard, followed by a broadcast.
pub fn run_tick(state: &SharedState, simulator: &mut TelemetrySimulator) -> Result<(), AppError> {
    run_tick_at(state, simulator, SystemTime::now())
}

fn run_tick_at(
    state: &SharedState,
    simulator: &mut TelemetrySimulator,
    now: SystemTime,
) -> Result<(), AppError> {
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    simulator.advance(guard.intersection_mut(), now);
    guard.publish_update();
    Ok(())
}

/// Running simulation task. Dropping the handle also ends the task; `stop` waits for it.
#[derive(Debug)]
pub struct SimulationHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SimulationHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Simulation task ended abnormally");
        }
    }
}

pub fn spawn_simulation(
    state: SharedState,
    mut simulator: TelemetrySimulator,
    settings: &SimulationSettings,
) -> SimulationHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let tick_interval = settings.tick_interval;
    let schedule_interval = settings.schedule_interval;

    info!(
        tick_ms = tick_interval.as_millis(),
        schedule_interval = ?schedule_interval,
        "Starting telemetry simulation"
    );

    let task = tokio::spawn(async move {
        let mut ticker = delayed_interval(tick_interval);
        let mut scheduler_ticker = schedule_interval.map(delayed_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match run_tick(&state, &mut simulator) {
                        Ok(()) => debug!("Telemetry tick applied"),
                        Err(e) => warn!("Error running telemetry tick: {}", e),
                    }
                }
                _ = next_tick(&mut scheduler_ticker) => {
                    if let Err(e) = control::run_scheduling_cycle(&state) {
                        warn!("Error running scheduling cycle: {}", e);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Telemetry simulation stopped");
    });

    SimulationHandle { shutdown, task }
}

fn delayed_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
