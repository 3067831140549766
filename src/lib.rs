pub mod api;
pub mod config;
pub mod control;
pub mod error;
pub mod scenario;
pub mod scheduler;
pub mod simulation;
pub mod state;
