//! Workout definition parser.
//!
//! Turns a markdown-like workout document into a flat [`Workout`]:
//!
//! ```text
//! # Morning Session
//!
//! ## Warm-up - 2:00
//! Easy jog on the spot
//!
//! ### Circle: 3 rounds
//! ## Push-ups - 15 reps
//! ## Squats - 0:45
//! Rest - 0:30
//!
//! ## Plank - 3 sets x 0:30 / 0:15
//! ```
//!
//! Circuits and sets are expanded here, so the engine only ever sees a
//! flat list. The parser never fails: anything it does not recognize is
//! skipped, and a header with an unreadable duration still yields a step.

use crate::duration::{parse_clock, parse_reps};
use crate::types::*;
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound for set and round counts
pub const MAX_REPEAT: u32 = 1000;

/// Upper bound for the expanded step list of one document
pub const MAX_STEPS: usize = 10_000;

static SETS_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?)\s*-\s*(\d+)\s+sets?\s*x\s*(\d+:\d+)\s*/\s*(\d+:\d+)$")
        .expect("sets pattern is valid")
});

static TIME_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*-\s*(\d+:\d+)$").expect("time pattern is valid"));

static REPS_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s*-\s*(\d+\s+reps?)$").expect("reps pattern is valid"));

static CIRCLE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^###\s+circle:\s*(\d+)\s+rounds?$").expect("circle pattern is valid")
});

static EXERCISE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{2,3})\s+(.+)$").expect("header pattern is valid"));

static REST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^rest\s*-\s*(\d+:\d+)$").expect("rest pattern is valid"));

/// Parse a workout document
pub fn parse(document: &str) -> Workout {
    let mut scanner = Scanner::default();
    for line in document.lines() {
        scanner.feed(line.trim());
    }
    let workout = scanner.finish();

    tracing::debug!(
        "Parsed workout {:?} with {} steps",
        workout.title,
        workout.steps.len()
    );
    workout
}

// ============================================================================
// Blocks
// ============================================================================

/// What a block header asked for
#[derive(Debug)]
enum Header {
    Single {
        name: String,
        kind: StepKind,
        measure: Measure,
    },
    Sets {
        name: String,
        sets: u32,
        work: u32,
        rest: u32,
    },
}

/// A header plus the body lines collected under it
#[derive(Debug)]
struct Block {
    header: Header,
    runs: Vec<Vec<String>>,
    gap: bool,
}

impl Block {
    fn new(header: Header) -> Self {
        Self {
            header,
            runs: Vec::new(),
            gap: false,
        }
    }

    fn push_line(&mut self, line: &str) {
        if self.gap || self.runs.is_empty() {
            self.runs.push(Vec::new());
            self.gap = false;
        }
        if let Some(run) = self.runs.last_mut() {
            run.push(line.to_string());
        }
    }

    fn mark_gap(&mut self) {
        if !self.runs.is_empty() {
            self.gap = true;
        }
    }

    fn is_sets(&self) -> bool {
        matches!(self.header, Header::Sets { .. })
    }

    /// Lines of a run joined by `\n`, runs joined by a blank line
    fn description(&self) -> Option<String> {
        if self.runs.is_empty() {
            return None;
        }
        let runs: Vec<String> = self.runs.iter().map(|run| run.join("\n")).collect();
        Some(runs.join("\n\n"))
    }

    fn into_steps(self) -> Vec<Step> {
        let description = self.description();

        match self.header {
            Header::Single {
                name,
                kind,
                measure,
            } => {
                let description = match (description, kind) {
                    (None, StepKind::Rest) => Some(DEFAULT_REST_DESCRIPTION.to_string()),
                    (description, _) => description,
                };
                vec![Step {
                    name,
                    kind,
                    measure,
                    description,
                    set: None,
                    round: None,
                }]
            }

            Header::Sets {
                name,
                sets,
                work,
                rest,
            } => {
                let mut steps = Vec::with_capacity((sets as usize * 2).saturating_sub(1));
                for set_number in 1..=sets {
                    let info = SetInfo {
                        exercise_name: name.clone(),
                        set_number,
                        total_sets: sets,
                    };

                    steps.push(Step {
                        name: format!("{} (Set {}/{})", name, set_number, sets),
                        kind: StepKind::Exercise,
                        measure: Measure::Time { seconds: work },
                        description: description.clone(),
                        set: Some(info.clone()),
                        round: None,
                    });

                    if set_number < sets {
                        let mut between = Step::rest(SET_REST_NAME, rest);
                        between.set = Some(info);
                        steps.push(between);
                    }
                }
                steps
            }
        }
    }
}

/// An open `### Circle` section
#[derive(Debug)]
struct Circuit {
    rounds: u32,
    members: Vec<Step>,
}

impl Circuit {
    /// Lazily repeat the members once per round
    fn expand(self) -> impl Iterator<Item = Step> {
        let Circuit { rounds, members } = self;
        (1..=rounds).flat_map(move |round| {
            members.clone().into_iter().map(move |mut step| {
                if step.kind == StepKind::Exercise {
                    step.name = format!("Round {}/{}: {}", round, rounds, step.name);
                }
                step.round = Some(RoundInfo {
                    round,
                    total_rounds: rounds,
                });
                step
            })
        })
    }
}

// ============================================================================
// Scanner
// ============================================================================

#[derive(Debug, Default)]
struct Scanner {
    title: Option<String>,
    steps: Vec<Step>,
    block: Option<Block>,
    circuit: Option<Circuit>,
    truncated: bool,
}

impl Scanner {
    fn feed(&mut self, line: &str) {
        if line.is_empty() {
            if let Some(block) = self.block.as_mut() {
                block.mark_gap();
            }
            if self.circuit_has_members() {
                self.close_circuit();
            }
            return;
        }

        if let Some(title) = line.strip_prefix("# ") {
            self.flush_block();
            if self.title.is_none() {
                self.title = Some(title.trim().to_string());
            }
            return;
        }

        if let Some(caps) = CIRCLE_MARKER.captures(line) {
            self.close_circuit();
            self.circuit = Some(Circuit {
                rounds: repeat_count(&caps[1], "rounds"),
                members: Vec::new(),
            });
            return;
        }

        if let Some(caps) = EXERCISE_HEADER.captures(line) {
            if caps[1].len() == 3 {
                self.close_circuit();
            } else {
                self.flush_block();
            }
            self.block = Some(Block::new(parse_header(caps[2].trim())));
            return;
        }

        if let Some(caps) = REST_LINE.captures(line) {
            self.flush_block();
            let seconds = parse_clock(&caps[1]).unwrap_or(0);
            self.block = Some(Block::new(Header::Single {
                name: "Rest".to_string(),
                kind: StepKind::Rest,
                measure: Measure::Time { seconds },
            }));
            return;
        }

        if line.starts_with('#') {
            return;
        }

        match self.block.as_mut() {
            Some(block) => block.push_line(line),
            None => tracing::trace!("Ignoring body line outside any block: {:?}", line),
        }
    }

    fn circuit_has_members(&self) -> bool {
        self.circuit
            .as_ref()
            .map(|c| !c.members.is_empty() || self.block.is_some())
            .unwrap_or(false)
    }

    fn flush_block(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };

        match self.circuit.as_mut() {
            Some(circuit) => {
                if block.is_sets() {
                    tracing::warn!(
                        "Sets notation inside a circuit has no defined nesting; repeating the expanded sets each round"
                    );
                }
                circuit.members.extend(block.into_steps());
            }
            None => self.emit(block.into_steps()),
        }
    }

    fn close_circuit(&mut self) {
        self.flush_block();
        if let Some(circuit) = self.circuit.take() {
            self.emit(circuit.expand());
        }
    }

    /// Append to the workout, stopping at [`MAX_STEPS`]
    fn emit(&mut self, steps: impl IntoIterator<Item = Step>) {
        let room = MAX_STEPS.saturating_sub(self.steps.len());
        let mut steps = steps.into_iter();
        self.steps.extend(steps.by_ref().take(room));

        if !self.truncated && steps.next().is_some() {
            tracing::warn!("Workout expands past {} steps, dropping the rest", MAX_STEPS);
            self.truncated = true;
        }
    }

    fn finish(mut self) -> Workout {
        self.close_circuit();
        Workout {
            title: self.title.unwrap_or_default(),
            steps: self.steps,
        }
    }
}

/// Interpret the text after `## ` / `### `
fn parse_header(text: &str) -> Header {
    if let Some(caps) = SETS_SPEC.captures(text) {
        if let (Some(work), Some(rest)) = (parse_clock(&caps[3]), parse_clock(&caps[4])) {
            return Header::Sets {
                name: caps[1].trim().to_string(),
                sets: repeat_count(&caps[2], "sets"),
                work,
                rest,
            };
        }
    }

    if let Some(caps) = TIME_SPEC.captures(text) {
        if let Some(seconds) = parse_clock(&caps[2]) {
            let name = caps[1].trim().to_string();
            return Header::Single {
                kind: kind_for(&name),
                name,
                measure: Measure::Time { seconds },
            };
        }
    }

    if let Some(caps) = REPS_SPEC.captures(text) {
        if let Some(count) = parse_reps(&caps[2]) {
            return Header::Single {
                name: caps[1].trim().to_string(),
                kind: StepKind::Exercise,
                measure: Measure::Reps { count },
            };
        }
    }

    tracing::warn!(
        "Exercise {:?} has no recognizable time, reps or sets; using a zero-length timer",
        text
    );
    let name = text
        .rsplit_once(" - ")
        .map(|(name, _)| name.trim())
        .unwrap_or(text);
    Header::Single {
        kind: kind_for(name),
        name: name.to_string(),
        measure: Measure::Time { seconds: 0 },
    }
}

/// `## Rest - 0:30` behaves like a bare rest line
fn kind_for(name: &str) -> StepKind {
    if name.eq_ignore_ascii_case("rest") {
        StepKind::Rest
    } else {
        StepKind::Exercise
    }
}

fn repeat_count(digits: &str, what: &str) -> u32 {
    let count = digits.parse::<u32>().unwrap_or(u32::MAX);
    if count > MAX_REPEAT {
        tracing::warn!("{} {} exceeds the limit, using {}", digits, what, MAX_REPEAT);
        MAX_REPEAT
    } else {
        count
    }
}
