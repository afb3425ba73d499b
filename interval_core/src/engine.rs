//! Workout execution engine.
//!
//! A state machine over one loaded [`Workout`]:
//!
//! ```text
//!            start              pause
//!   Idle ───────────▶ Running ◀────────▶ Paused
//!    ▲                 │   ▲    start      │
//!    │ reset           │   └──── skip ─────┘
//!    │                 ▼ skip / countdown past last step
//!    └──────────── Complete
//! ```
//!
//! The engine owns no timer. The host calls [`Engine::tick`] once per second
//! with a [`TickToken`]; tokens issued before the last `load`/`reset` are
//! ignored, so a timer callback left over from an old workout cannot move
//! the new one. Everything runs on the caller's thread.

use crate::ports::{AudioPort, WakeLockPort};
use crate::{Step, Workout};
use serde::Serialize;
use std::collections::BTreeSet;

/// Run state of the engine
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Complete,
}

impl RunState {
    pub fn controls(self) -> Controls {
        Controls::for_state(self)
    }
}

/// Which host controls are usable
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Controls {
    pub start: bool,
    pub pause: bool,
    pub skip: bool,
    pub reset: bool,
}

impl Controls {
    /// Control enablement, derived from the run state alone
    pub fn for_state(run: RunState) -> Self {
        Self {
            start: matches!(run, RunState::Idle | RunState::Paused),
            pause: run == RunState::Running,
            skip: matches!(run, RunState::Running | RunState::Paused),
            reset: true,
        }
    }
}

/// Tag handed to the host timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickToken {
    generation: u64,
}

/// Read-only projection of the engine for rendering
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Snapshot {
    pub current_index: usize,
    pub remaining_seconds: u32,
    pub run: RunState,
    pub progress_fraction: f64,
    pub position_label: String,
    pub step: Option<Step>,
    pub controls: Controls,
}

/// Handle returned by [`Engine::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&Snapshot)>;

#[derive(Clone, Copy, Debug)]
enum Cue {
    StepComplete,
    WorkoutComplete,
}

/// Timer state machine driving one workout
pub struct Engine {
    workout: Option<Workout>,
    current_index: usize,
    remaining_seconds: u32,
    run: RunState,
    completed: BTreeSet<usize>,
    generation: u64,
    audio: Box<dyn AudioPort>,
    wake_lock: Box<dyn WakeLockPort>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl Engine {
    pub fn new(audio: Box<dyn AudioPort>, wake_lock: Box<dyn WakeLockPort>) -> Self {
        Self {
            workout: None,
            current_index: 0,
            remaining_seconds: 0,
            run: RunState::Idle,
            completed: BTreeSet::new(),
            generation: 0,
            audio,
            wake_lock,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    // ------------------------------------------------------------------
    // Host actions
    // ------------------------------------------------------------------

    /// Replace the workout and start over from the first step
    pub fn load(&mut self, workout: Workout) {
        tracing::info!(
            "Loading workout {:?} ({} steps)",
            workout.title,
            workout.steps.len()
        );
        self.workout = Some(workout);
        self.reinitialize();
        self.notify();
    }

    /// Begin the workout, or resume it after a pause
    pub fn start(&mut self) {
        if self.step_count() == 0 {
            tracing::debug!("start ignored: no steps loaded");
            return;
        }

        match self.run {
            RunState::Idle | RunState::Paused => {
                tracing::info!(
                    "{} at step {}",
                    if self.run == RunState::Idle { "Starting" } else { "Resuming" },
                    self.current_index
                );
                self.run = RunState::Running;
                self.acquire_wake_lock();
                self.notify();
            }
            RunState::Running | RunState::Complete => {
                tracing::debug!("start ignored while {:?}", self.run);
            }
        }
    }

    /// Freeze the countdown
    pub fn pause(&mut self) {
        if self.run != RunState::Running {
            tracing::debug!("pause ignored while {:?}", self.run);
            return;
        }

        tracing::info!(
            "Paused at step {} with {}s left",
            self.current_index,
            self.remaining_seconds
        );
        self.run = RunState::Paused;
        self.release_wake_lock();
        self.notify();
    }

    /// Finish the current step now and move on
    pub fn skip(&mut self) {
        if self.step_count() == 0 {
            tracing::debug!("skip ignored: no steps loaded");
            return;
        }

        match self.run {
            RunState::Running => self.advance(),
            RunState::Paused => {
                self.acquire_wake_lock();
                self.advance();
            }
            RunState::Idle | RunState::Complete => {
                tracing::debug!("skip ignored while {:?}", self.run);
            }
        }
    }

    /// Mark a rep-counted step as done
    ///
    /// Only acts while running on a reps step; timed steps finish through
    /// their countdown or [`Engine::skip`].
    pub fn complete_reps(&mut self) {
        let on_reps = self.current_step().map(|s| !s.is_timed()).unwrap_or(false);
        if self.run == RunState::Running && on_reps {
            self.advance();
        } else {
            tracing::debug!("complete_reps ignored while {:?}", self.run);
        }
    }

    /// Back to the first step, idle, nothing completed
    pub fn reset(&mut self) {
        tracing::info!("Resetting workout");
        self.reinitialize();
        self.notify();
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Token for the host timer; invalidated by `load` and `reset`
    pub fn ticker(&self) -> TickToken {
        TickToken {
            generation: self.generation,
        }
    }

    /// One second has elapsed
    ///
    /// Returns whether the tick was applied. Ticks are dropped when the token
    /// is stale, the engine is not running, or the current step counts reps.
    pub fn tick(&mut self, token: TickToken) -> bool {
        if token.generation != self.generation {
            tracing::debug!(
                "Dropping stale tick from generation {} (current {})",
                token.generation,
                self.generation
            );
            return false;
        }

        if self.run != RunState::Running {
            return false;
        }

        if !self.current_step().map(Step::is_timed).unwrap_or(false) {
            return false;
        }

        if self.remaining_seconds <= 1 {
            self.remaining_seconds = 0;
            self.advance();
        } else {
            self.remaining_seconds -= 1;
            self.notify();
        }
        true
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Register a callback invoked after every state change
    ///
    /// Subscribers run synchronously, in registration order, and stay
    /// registered across `load`.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Snapshot) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn snapshot(&self) -> Snapshot {
        let total = self.step_count();
        let shown = (self.current_index + 1).min(total);

        Snapshot {
            current_index: self.current_index,
            remaining_seconds: self.remaining_seconds,
            run: self.run,
            progress_fraction: self.progress_fraction(),
            position_label: format!("Exercise {} of {}", shown, total),
            step: self.current_step().cloned(),
            controls: Controls::for_state(self.run),
        }
    }

    pub fn workout(&self) -> Option<&Workout> {
        self.workout.as_ref()
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// The active step; None before loading and once complete
    pub fn current_step(&self) -> Option<&Step> {
        self.workout
            .as_ref()
            .and_then(|w| w.steps.get(self.current_index))
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Elapsed share of the active timed step, in `[0, 1]`
    pub fn progress_fraction(&self) -> f64 {
        if self.run == RunState::Complete {
            return 1.0;
        }

        match self.current_step().and_then(Step::duration_seconds) {
            Some(duration) if duration > 0 => {
                let left = f64::from(self.remaining_seconds) / f64::from(duration);
                (1.0 - left).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn step_count(&self) -> usize {
        self.workout.as_ref().map(Workout::len).unwrap_or(0)
    }

    fn reinitialize(&mut self) {
        self.generation += 1;
        self.current_index = 0;
        self.run = RunState::Idle;
        self.completed.clear();
        self.remaining_seconds = self
            .current_step()
            .and_then(Step::duration_seconds)
            .unwrap_or(0);
        self.release_wake_lock();
    }

    /// Shared by skip, complete_reps and an expired countdown
    fn advance(&mut self) {
        let total = self.step_count();
        self.completed.insert(self.current_index);
        self.current_index += 1;
        self.cue(Cue::StepComplete);

        if self.current_index >= total {
            self.current_index = total;
            self.remaining_seconds = 0;
            self.run = RunState::Complete;
            tracing::info!("Workout complete after {} steps", total);
            self.cue(Cue::WorkoutComplete);
            self.release_wake_lock();
        } else {
            self.remaining_seconds = self
                .current_step()
                .and_then(Step::duration_seconds)
                .unwrap_or(0);
            self.run = RunState::Running;
            tracing::debug!(
                "Advanced to step {} ({}s)",
                self.current_index,
                self.remaining_seconds
            );
        }

        self.notify();
    }

    fn cue(&mut self, cue: Cue) {
        let result = match cue {
            Cue::StepComplete => self.audio.on_step_complete(),
            Cue::WorkoutComplete => self.audio.on_workout_complete(),
        };
        if let Err(e) = result {
            tracing::warn!("Audio cue {:?} failed: {}", cue, e);
        }
    }

    fn acquire_wake_lock(&mut self) {
        if let Err(e) = self.wake_lock.acquire() {
            tracing::warn!("Wake lock request failed: {}", e);
        }
    }

    fn release_wake_lock(&mut self) {
        if let Err(e) = self.wake_lock.release() {
            tracing::warn!("Wake lock release failed: {}", e);
        }
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&snapshot);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("current_index", &self.current_index)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("run", &self.run)
            .field("completed", &self.completed)
            .field("generation", &self.generation)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
