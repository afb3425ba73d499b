//! Notification ports used by the execution engine.
//!
//! The engine announces step and workout completion and asks for the screen
//! to stay awake while a workout runs. How that happens (speaker, terminal
//! bell, power manager) is up to the host, which injects implementations of
//! these traits.
//!
//! Port calls are fire-and-forget from the engine's point of view: an `Err`
//! is logged and the state machine carries on.

use crate::Result;

/// Audible cues for workout progress
pub trait AudioPort {
    /// A step finished (by countdown or skip)
    fn on_step_complete(&mut self) -> Result<()>;

    /// The last step finished
    fn on_workout_complete(&mut self) -> Result<()>;
}

/// Keeps the display awake while a workout is running
pub trait WakeLockPort {
    fn acquire(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// Audio port that plays nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAudio;

impl AudioPort for SilentAudio {
    fn on_step_complete(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_workout_complete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Wake lock port for hosts without power management
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWakeLock;

impl WakeLockPort for NoWakeLock {
    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
