//! Workout session history.
//!
//! Finished and abandoned runs are appended to a JSONL (JSON Lines) file
//! with file locking so several `intervals` processes can share one log.
//! The engine never writes here; the host records a session when a run ends.

use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the session log inside the data directory
pub const SESSION_LOG: &str = "sessions.jsonl";

/// How a run ended
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Abandoned,
}

/// One recorded run of a workout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub workout_title: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps_completed: usize,
    pub total_steps: usize,
    pub outcome: SessionOutcome,
}

impl SessionRecord {
    /// Record a run that ends now
    pub fn ended_now(
        workout_title: impl Into<String>,
        started_at: DateTime<Utc>,
        steps_completed: usize,
        total_steps: usize,
        outcome: SessionOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workout_title: workout_title.into(),
            started_at,
            finished_at: Utc::now(),
            steps_completed,
            total_steps,
            outcome,
        }
    }

    /// Wall-clock length of the run, paused time included
    pub fn elapsed_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

/// Destination for finished runs
pub trait SessionSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()>;
}

/// Session log stored as one JSON object per line
///
/// Writers take an exclusive lock and readers a shared one, so concurrent
/// `intervals` processes never observe half a record.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionSink for JsonlSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        log.lock_exclusive()?;
        let written = log.write_all(&line);
        log.unlock()?;
        written?;

        tracing::debug!(
            "Recorded {:?} session {} in {:?}",
            record.outcome,
            record.id,
            self.path
        );
        Ok(())
    }
}

/// Every readable session in the log, oldest first
///
/// A missing log is empty. Lines that are not a session record are skipped
/// with a warning.
pub fn read_sessions(path: &Path) -> Result<Vec<SessionRecord>> {
    let mut log = match File::open(path) {
        Ok(log) => log,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut contents = String::new();
    log.lock_shared()?;
    let read = log.read_to_string(&mut contents);
    log.unlock()?;
    read?;

    let records: Vec<SessionRecord> = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable session on line {}: {}", index + 1, e);
                None
            }
        })
        .collect();

    tracing::debug!("Read {} sessions from {:?}", records.len(), path);
    Ok(records)
}

/// The newest `limit` sessions, newest first
pub fn load_recent(path: &Path, limit: usize) -> Result<Vec<SessionRecord>> {
    let mut records = read_sessions(path)?;
    records.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
    records.truncate(limit);
    Ok(records)
}

// ============================================================================
// Aggregate statistics
// ============================================================================

/// Totals over the whole session log
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Stats {
    /// Every recorded run, abandoned ones included
    pub total_workouts: usize,
    pub completed_workouts: usize,
    /// Wall-clock time of completed runs
    pub total_time_seconds: i64,
    /// Steps finished across all runs
    pub total_steps_completed: usize,
    /// Consecutive days with a completed run, ending today or yesterday
    pub streak_days: u32,
    pub first_workout_date: Option<NaiveDate>,
    pub last_workout_date: Option<NaiveDate>,
}

impl Stats {
    /// Fold sessions (in any order) into totals as of `today`
    ///
    /// Only completed runs extend the streak: another one on the same day
    /// keeps it, one on the following day adds a day, and a longer gap
    /// starts over at 1. A streak whose last day is before yesterday has
    /// lapsed and reports 0.
    pub fn from_sessions(sessions: &[SessionRecord], today: NaiveDate) -> Self {
        let mut ordered: Vec<&SessionRecord> = sessions.iter().collect();
        ordered.sort_by_key(|s| s.finished_at);

        let mut stats = Stats::default();
        for session in ordered {
            stats.total_workouts += 1;
            stats.total_steps_completed += session.steps_completed;
            if stats.first_workout_date.is_none() {
                stats.first_workout_date = Some(session.started_at.date_naive());
            }

            if session.outcome != SessionOutcome::Completed {
                continue;
            }

            let day = session.finished_at.date_naive();
            stats.completed_workouts += 1;
            stats.total_time_seconds += session.elapsed_seconds();
            stats.streak_days = match stats.last_workout_date {
                Some(last) if last == day => stats.streak_days,
                Some(last) if last.succ_opt() == Some(day) => stats.streak_days + 1,
                _ => 1,
            };
            stats.last_workout_date = Some(day);
        }

        let lapsed = stats
            .last_workout_date
            .map(|last| (today - last).num_days() > 1)
            .unwrap_or(true);
        if lapsed {
            stats.streak_days = 0;
        }
        stats
    }

    /// Total completed time as `2h 5m` or `45m`
    pub fn formatted_total_time(&self) -> String {
        let hours = self.total_time_seconds / 3600;
        let minutes = (self.total_time_seconds % 3600) / 60;
        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}m", minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(title: &str, minutes_ago: i64) -> SessionRecord {
        let mut record = SessionRecord::ended_now(
            title,
            Utc::now() - Duration::minutes(minutes_ago + 10),
            4,
            6,
            SessionOutcome::Abandoned,
        );
        record.finished_at = Utc::now() - Duration::minutes(minutes_ago);
        record
    }

    #[test]
    fn test_append_and_read_single_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join(SESSION_LOG);

        let session = record("Leg Day", 0);
        let session_id = session.id;

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&session).unwrap();

        let sessions = read_sessions(&log_path).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session_id);
        assert_eq!(sessions[0].outcome, SessionOutcome::Abandoned);
        assert_eq!(sessions[0].elapsed_seconds(), 600);
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("nested/dir").join(SESSION_LOG);

        JsonlSink::new(&log_path).append(&record("A", 0)).unwrap();
        assert!(log_path.exists());
    }

    #[test]
    fn test_read_missing_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sessions = read_sessions(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join(SESSION_LOG);

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&record("Good", 5)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
            writeln!(file, "{{ not json").unwrap();
            writeln!(file).unwrap();
        }
        sink.append(&record("Also good", 1)).unwrap();

        let sessions = read_sessions(&log_path).unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_load_recent_newest_first_with_limit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join(SESSION_LOG);

        let mut sink = JsonlSink::new(&log_path);
        for (title, minutes_ago) in [("old", 30), ("newest", 1), ("middle", 10)] {
            sink.append(&record(title, minutes_ago)).unwrap();
        }

        let recent = load_recent(&log_path, 2).unwrap();
        let titles: Vec<&str> = recent.iter().map(|r| r.workout_title.as_str()).collect();
        assert_eq!(titles, vec!["newest", "middle"]);
    }

    fn on_day(day: NaiveDate, minutes: i64, outcome: SessionOutcome) -> SessionRecord {
        let finished_at = day.and_hms_opt(18, 0, 0).unwrap().and_utc();
        SessionRecord {
            id: Uuid::new_v4(),
            workout_title: "Daily".into(),
            started_at: finished_at - Duration::minutes(minutes),
            finished_at,
            steps_completed: 5,
            total_steps: 5,
            outcome,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_stats_count_completed_and_abandoned() {
        let mut abandoned = on_day(date(1), 5, SessionOutcome::Abandoned);
        abandoned.steps_completed = 2;
        let sessions = vec![
            on_day(date(1), 30, SessionOutcome::Completed),
            abandoned,
            on_day(date(2), 45, SessionOutcome::Completed),
        ];

        let stats = Stats::from_sessions(&sessions, date(2));
        assert_eq!(stats.total_workouts, 3);
        assert_eq!(stats.completed_workouts, 2);
        assert_eq!(stats.total_steps_completed, 12);
        // abandoned time is not counted
        assert_eq!(stats.total_time_seconds, 75 * 60);
        assert_eq!(stats.formatted_total_time(), "1h 15m");
        assert_eq!(stats.first_workout_date, Some(date(1)));
        assert_eq!(stats.last_workout_date, Some(date(2)));
    }

    #[test]
    fn test_streak_rules() {
        let done = |day| on_day(date(day), 20, SessionOutcome::Completed);

        // same day keeps, next day adds
        let sessions = vec![done(3), done(4), done(4), done(5)];
        assert_eq!(Stats::from_sessions(&sessions, date(5)).streak_days, 3);

        // a gap starts over at 1
        let sessions = vec![done(3), done(4), done(7)];
        assert_eq!(Stats::from_sessions(&sessions, date(7)).streak_days, 1);

        // still alive the day after, lapsed after that
        assert_eq!(Stats::from_sessions(&sessions, date(8)).streak_days, 1);
        assert_eq!(Stats::from_sessions(&sessions, date(9)).streak_days, 0);
    }

    #[test]
    fn test_streak_ignores_abandoned_runs_and_input_order() {
        let sessions = vec![
            on_day(date(12), 20, SessionOutcome::Completed),
            on_day(date(11), 20, SessionOutcome::Abandoned),
            on_day(date(10), 20, SessionOutcome::Completed),
        ];

        let stats = Stats::from_sessions(&sessions, date(12));
        assert_eq!(stats.streak_days, 1);
        assert_eq!(stats.completed_workouts, 2);
    }

    #[test]
    fn test_stats_empty_log() {
        let stats = Stats::from_sessions(&[], date(1));
        assert_eq!(stats, Stats::default());
        assert_eq!(stats.formatted_total_time(), "0m");
    }
}
