//! Terminal adapters for the engine's notification ports.

use interval_core::{AudioPort, Result, WakeLockPort};
use std::io::{self, Write};

/// Audio cues as BEL characters on stdout
#[derive(Debug, Default)]
pub struct TerminalBell;

impl TerminalBell {
    fn ring(&self, times: usize) -> Result<()> {
        let mut out = io::stdout().lock();
        for _ in 0..times {
            out.write_all(b"\x07")?;
        }
        out.flush()?;
        Ok(())
    }
}

impl AudioPort for TerminalBell {
    fn on_step_complete(&mut self) -> Result<()> {
        self.ring(1)
    }

    fn on_workout_complete(&mut self) -> Result<()> {
        self.ring(3)
    }
}

/// Wake lock stand-in for terminals: records whether the lock is held
///
/// Terminals have no display-sleep API, so holding the lock only logs.
#[derive(Debug, Default)]
pub struct InhibitLog {
    held: bool,
}

impl WakeLockPort for InhibitLog {
    fn acquire(&mut self) -> Result<()> {
        if !self.held {
            tracing::info!("Wake lock acquired");
            self.held = true;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.held {
            tracing::info!("Wake lock released");
            self.held = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inhibit_log_tracks_held_state() {
        let mut lock = InhibitLog::default();
        lock.release().unwrap();
        assert!(!lock.held);

        lock.acquire().unwrap();
        lock.acquire().unwrap();
        assert!(lock.held);

        lock.release().unwrap();
        assert!(!lock.held);
    }
}
