//! Mission control.
//!
//! - Behavior FSM (WAIT / TRAVEL / APPROACH / DOCK)
//! - Nested docking FSM
//! - Bump and obstacle interrupts
//! - Mission profile (station catalog, detours, resume policy)
//! - Motion sink abstraction

mod behavior;
mod docking;
mod interrupt;
mod mission;
mod sink;

pub use behavior::{BehaviorController, BehaviorState, ControlOutput};
pub use docking::{DockState, DockStatus, DockTarget, DockingController, DockingStep};
pub use interrupt::InterruptHandler;
pub use mission::{MapTransform, MissionProfile, Station, StationCatalog};
pub use sink::{MotionSink, RecordingSink, SharedVelocitySink};
