//! Shared state for the multi-threaded runtime.
//!
//! Lock-free flags and the last commanded velocity, shared between:
//! - Main thread (monitoring, shutdown)
//! - Control thread (writes velocity, mission status)
//! - Simulator thread (reads velocity)

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::types::Twist;

/// Atomic velocity command.
/// Packs linear and angular f32 bits into one AtomicU64 so readers never
/// see half of an update.
#[derive(Debug)]
pub struct AtomicTwist(AtomicU64);

impl AtomicTwist {
    pub fn new(cmd: Twist) -> Self {
        Self(AtomicU64::new(Self::pack(cmd)))
    }

    pub fn load(&self, order: Ordering) -> Twist {
        let bits = self.0.load(order);
        Twist::new(
            f32::from_bits((bits >> 32) as u32),
            f32::from_bits(bits as u32),
        )
    }

    pub fn store(&self, cmd: Twist, order: Ordering) {
        self.0.store(Self::pack(cmd), order);
    }

    fn pack(cmd: Twist) -> u64 {
        ((cmd.linear.to_bits() as u64) << 32) | cmd.angular.to_bits() as u64
    }
}

/// Shared state between all threads.
#[derive(Debug)]
pub struct SharedState {
    /// Velocity command (m/s, rad/s)
    velocity: AtomicTwist,

    /// Home reached
    mission_complete: AtomicBool,

    /// Shutdown signal for graceful termination
    shutdown: AtomicBool,

    /// Control ticks executed (for status reporting)
    tick_count: AtomicU32,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            velocity: AtomicTwist::new(Twist::STOP),
            mission_complete: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            tick_count: AtomicU32::new(0),
        }
    }

    /// Get the last velocity command.
    pub fn velocity(&self) -> Twist {
        self.velocity.load(Ordering::Acquire)
    }

    /// Set velocity command.
    pub fn set_velocity(&self, cmd: Twist) {
        self.velocity.store(cmd, Ordering::Release);
    }

    /// Signal shutdown.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Check if shutdown is signaled.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Mark the mission as complete.
    pub fn set_mission_complete(&self) {
        self.mission_complete.store(true, Ordering::Release);
    }

    pub fn is_mission_complete(&self) -> bool {
        self.mission_complete.load(Ordering::Acquire)
    }

    pub fn increment_tick_count(&self) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_twist_keeps_both_halves() {
        let a = AtomicTwist::new(Twist::new(-0.25, 0.5));
        assert_eq!(a.load(Ordering::Relaxed), Twist::new(-0.25, 0.5));
        a.store(Twist::new(0.15, -1.5), Ordering::Relaxed);
        assert_eq!(a.load(Ordering::Relaxed), Twist::new(0.15, -1.5));
        a.store(Twist::STOP, Ordering::Relaxed);
        assert!(a.load(Ordering::Relaxed).is_stop());
    }

    #[test]
    fn test_concurrent_commands_never_tear() {
        use std::sync::Arc;
        use std::thread;

        let state = Arc::new(SharedState::new());
        let writer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for i in 0..10_000 {
                    // Angular always mirrors linear
                    let v = (i % 100) as f32 * 0.01;
                    state.set_velocity(Twist::new(v, -v));
                }
            })
        };
        for _ in 0..10_000 {
            let cmd = state.velocity();
            assert_eq!(cmd.angular, -cmd.linear);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_velocity_and_flags() {
        let state = SharedState::new();
        assert!(state.velocity().is_stop());
        state.set_velocity(Twist::new(0.1, -0.2));
        assert_eq!(state.velocity(), Twist::new(0.1, -0.2));

        assert!(!state.should_shutdown());
        state.signal_shutdown();
        assert!(state.should_shutdown());

        state.set_mission_complete();
        assert!(state.is_mission_complete());
    }
}
