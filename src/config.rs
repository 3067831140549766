use crate::scenario::ScenarioProfile;
use crate::simulation::SimulationSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 5000;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_VEHICLE_DELTA_MIN: i32 = -3;
pub const DEFAULT_VEHICLE_DELTA_MAX: i32 = 5;
pub const DEFAULT_RED_WAIT_INCREMENT_SECS: u32 = 3;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub simulation: Option<SimulationSection>,
    #[serde(default)]
    pub scheduler: Option<SchedulerSection>,
    #[serde(default)]
    pub scenarios: Option<ScenariosSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 5000)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationSection {
    /// Seconds between telemetry ticks (default: 3)
    pub tick_interval_secs: Option<u64>,
    /// Inclusive bounds of the per-tick vehicle count change (default: -3..=5)
    pub vehicle_delta_min: Option<i32>,
    pub vehicle_delta_max: Option<i32>,
    /// Seconds added to waiting time for every red segment per tick (default: 3)
    pub red_wait_increment_secs: Option<u32>,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSection {
    /// Run a scheduling cycle on this cadence; unset or 0 disables it
    pub auto_cycle_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScenariosSection {
    #[serde(default)]
    pub profile: ScenarioProfile,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = self.vehicle_delta_range();
        if min > max {
            return Err(ConfigError::Invalid(format!(
                "vehicle_delta_min ({min}) exceeds vehicle_delta_max ({max})"
            )));
        }
        if self.tick_interval().is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the configured log level, falling back to info for unknown values.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }

    /// Returns the server port (default: 5000)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn tick_interval(&self) -> Duration {
        let secs = self
            .simulation
            .as_ref()
            .and_then(|s| s.tick_interval_secs)
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    pub fn vehicle_delta_range(&self) -> (i32, i32) {
        let section = self.simulation.as_ref();
        let min = section
            .and_then(|s| s.vehicle_delta_min)
            .unwrap_or(DEFAULT_VEHICLE_DELTA_MIN);
        let max = section
            .and_then(|s| s.vehicle_delta_max)
            .unwrap_or(DEFAULT_VEHICLE_DELTA_MAX);
        (min, max)
    }

    pub fn scenario_profile(&self) -> ScenarioProfile {
        self.scenarios
            .as_ref()
            .map(|s| s.profile)
            .unwrap_or_default()
    }

    /// Returns the automatic scheduling cadence, or None when disabled.
    pub fn auto_cycle_interval(&self) -> Option<Duration> {
        self.scheduler
            .as_ref()
            .and_then(|s| s.auto_cycle_interval_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    pub fn simulation_settings(&self) -> SimulationSettings {
        let section = self.simulation.as_ref();
        let (vehicle_delta_min, vehicle_delta_max) = self.vehicle_delta_range();
        SimulationSettings {
            tick_interval: self.tick_interval(),
            vehicle_delta_min,
            vehicle_delta_max,
            red_wait_increment: section
                .and_then(|s| s.red_wait_increment_secs)
                .unwrap_or(DEFAULT_RED_WAIT_INCREMENT_SECS),
            seed: section.and_then(|s| s.seed),
            schedule_interval: self.auto_cycle_interval(),
        }
    }
}
