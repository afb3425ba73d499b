#![forbid(unsafe_code)]

//! Core domain model and execution logic for Intervals.
//!
//! This crate provides:
//! - Domain types (workouts, steps, measures)
//! - The workout document parser
//! - The execution engine and its notification ports
//! - Session history persistence
//! - Configuration and logging setup

pub mod types;
pub mod error;
pub mod duration;
pub mod parser;
pub mod ports;
pub mod engine;
pub mod config;
pub mod logging;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use duration::{format_clock, parse_clock};
pub use parser::parse;
pub use ports::{AudioPort, NoWakeLock, SilentAudio, WakeLockPort};
pub use engine::{Controls, Engine, RunState, Snapshot, SubscriptionId, TickToken};
pub use history::{JsonlSink, SessionOutcome, SessionRecord, SessionSink, Stats};
