//! Core domain types for Intervals.
//!
//! This module defines the fundamental types shared by the parser and the
//! execution engine:
//! - Workouts and their flattened step list
//! - How a step is measured (time or reps)
//! - Provenance of expanded steps (sets and circuit rounds)

use serde::{Deserialize, Serialize};

/// Description given to rest steps that have no authored body
pub const DEFAULT_REST_DESCRIPTION: &str = "Take a break and prepare for the next exercise";

/// Name of every rest step produced by sets notation
pub const SET_REST_NAME: &str = "Rest between sets";

// ============================================================================
// Step Types
// ============================================================================

/// Whether a step is work or recovery
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Exercise,
    Rest,
}

/// How a step is measured
///
/// A step is either timed or counted, never both.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measure {
    /// Countdown of a fixed number of seconds
    Time { seconds: u32 },
    /// A number of repetitions, finished manually
    Reps { count: u32 },
}

/// Position of a step inside a sets expansion
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetInfo {
    pub exercise_name: String,
    pub set_number: u32,
    pub total_sets: u32,
}

/// Position of a step inside a circuit expansion
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundInfo {
    pub round: u32,
    pub total_rounds: u32,
}

/// One atomic unit of a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
    pub measure: Measure,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<SetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundInfo>,
}

impl Step {
    /// A timed exercise with no description
    pub fn timed(name: impl Into<String>, seconds: u32) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Exercise,
            measure: Measure::Time { seconds },
            description: None,
            set: None,
            round: None,
        }
    }

    /// A rep-counted exercise with no description
    pub fn reps(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Exercise,
            measure: Measure::Reps { count },
            description: None,
            set: None,
            round: None,
        }
    }

    /// A timed rest carrying the default rest description
    pub fn rest(name: impl Into<String>, seconds: u32) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Rest,
            measure: Measure::Time { seconds },
            description: Some(DEFAULT_REST_DESCRIPTION.to_string()),
            set: None,
            round: None,
        }
    }

    /// Countdown length, present iff the step is timed
    pub fn duration_seconds(&self) -> Option<u32> {
        match self.measure {
            Measure::Time { seconds } => Some(seconds),
            Measure::Reps { .. } => None,
        }
    }

    /// Rep target, present iff the step is counted
    pub fn rep_count(&self) -> Option<u32> {
        match self.measure {
            Measure::Reps { count } => Some(count),
            Measure::Time { .. } => None,
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self.measure, Measure::Time { .. })
    }

    pub fn is_rest(&self) -> bool {
        self.kind == StepKind::Rest
    }

    /// Display paragraphs of the description, one per non-empty line
    pub fn paragraphs(&self) -> Vec<&str> {
        self.description
            .as_deref()
            .map(|d| {
                d.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Workout Type
// ============================================================================

/// A parsed workout: a title and a flat, ordered list of steps
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workout {
    pub title: String,
    pub steps: Vec<Step>,
}

impl Workout {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all timed steps; rep steps contribute nothing
    pub fn total_duration_seconds(&self) -> u64 {
        self.steps
            .iter()
            .filter_map(Step::duration_seconds)
            .map(u64::from)
            .sum()
    }
}
