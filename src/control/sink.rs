//! Output side of the controller: velocity commands and audible feedback.

use std::sync::Arc;

use crate::error::Result;
use crate::shared::SharedState;
use crate::types::{Tone, Twist};

/// Destination for motion commands.
pub trait MotionSink {
    fn send_velocity(&mut self, cmd: Twist) -> Result<()>;

    /// Audible feedback. Hardware without a buzzer ignores it.
    fn play_tone(&mut self, _tone: Tone) {}
}

/// Publishes commands through [`SharedState`] for the drive thread.
pub struct SharedVelocitySink {
    shared_state: Arc<SharedState>,
    log_tones: bool,
}

impl SharedVelocitySink {
    pub fn new(shared_state: Arc<SharedState>) -> Self {
        Self {
            shared_state,
            log_tones: false,
        }
    }

    /// Log tones instead of dropping them (bench mode has no buzzer).
    pub fn with_tone_log(mut self) -> Self {
        self.log_tones = true;
        self
    }
}

impl MotionSink for SharedVelocitySink {
    fn send_velocity(&mut self, cmd: Twist) -> Result<()> {
        self.shared_state.set_velocity(cmd);
        Ok(())
    }

    fn play_tone(&mut self, tone: Tone) {
        if self.log_tones {
            tracing::info!("Tone: {:?}", tone);
        }
    }
}

/// Records every command. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub velocities: Vec<Twist>,
    pub tones: Vec<Tone>,
}

impl MotionSink for RecordingSink {
    fn send_velocity(&mut self, cmd: Twist) -> Result<()> {
        self.velocities.push(cmd);
        Ok(())
    }

    fn play_tone(&mut self, tone: Tone) {
        self.tones.push(tone);
    }
}
