//! DhruvaDock - station-to-station mission controller for VacuumTiger
//!
//! Drives a differential-drive robot between dispensing stations, docks
//! precisely against each station's fiducial marker, and returns home.
//!
//! ## Layers
//!
//! - **sensors**: per-source channels drained into one snapshot per tick,
//!   marker memory with explicit absent marking, obstacle classification
//! - **control**: interrupt handler wrapping the behavior FSM, which nests
//!   the docking FSM; mission profile and motion sink
//! - **threads**: fixed-rate control loop and the bench simulator thread

pub mod config;
pub mod control;
pub mod error;
pub mod geometry;
pub mod sensors;
pub mod shared;
pub mod sim;
pub mod threads;
pub mod types;
pub mod utils;

pub use config::DockConfig;
pub use error::{DockError, Result};
