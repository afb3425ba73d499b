mod terminal;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use interval_core::history::{self, SESSION_LOG};
use interval_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use terminal::{InhibitLog, TerminalBell};

#[derive(Parser)]
#[command(name = "intervals")]
#[command(about = "Guided interval workouts from plain-text files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a workout file and print its steps
    Parse {
        /// Workout document
        file: PathBuf,

        /// Print the parsed workout as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a workout with a live countdown
    Run {
        /// Workout document
        file: PathBuf,

        /// Start immediately instead of waiting for Enter
        #[arg(long)]
        autostart: bool,

        /// Mark rep-based steps done as soon as they come up (for testing)
        #[arg(long)]
        auto_reps: bool,

        /// Milliseconds per countdown second (overrides config)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        tick_ms: Option<u64>,

        /// Do not record this run in the session history
        #[arg(long)]
        no_history: bool,
    },

    /// Show recently recorded sessions
    History {
        /// Number of sessions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show workout totals and the current streak
    Stats,

    /// Show the config file location and effective settings
    Config {
        /// Write a default config file if none exists yet
        #[arg(long)]
        init: bool,
    },
}

struct RunOptions {
    autostart: bool,
    auto_reps: bool,
    tick: Duration,
    record: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    interval_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Parse { file, json } => cmd_parse(file, json),
        Commands::Run {
            file,
            autostart,
            auto_reps,
            tick_ms,
            no_history,
        } => {
            let options = RunOptions {
                autostart,
                auto_reps,
                tick: tick_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.timer.tick_interval()),
                record: !no_history,
            };
            cmd_run(data_dir, file, options, &config)
        }
        Commands::History { limit } => cmd_history(data_dir, limit),
        Commands::Stats => cmd_stats(data_dir),
        Commands::Config { init } => cmd_config(&config, init),
    }
}

fn cmd_parse(file: PathBuf, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(&file)?;
    let workout = parse(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&workout)?);
    } else {
        display_workout(&workout);
    }
    Ok(())
}

fn cmd_run(data_dir: PathBuf, file: PathBuf, options: RunOptions, config: &Config) -> Result<()> {
    let text = std::fs::read_to_string(&file)?;
    let workout = parse(&text);

    if workout.is_empty() {
        println!("No steps found in {}", file.display());
        return Ok(());
    }

    display_workout(&workout);
    let mut log = SessionLog {
        sink: options
            .record
            .then(|| JsonlSink::new(data_dir.join(SESSION_LOG))),
        title: display_title(&workout).to_string(),
        total_steps: workout.len(),
        ended: 0,
    };

    let audio: Box<dyn AudioPort> = if config.audio.enabled {
        Box::new(TerminalBell)
    } else {
        Box::new(SilentAudio)
    };
    let wake_lock: Box<dyn WakeLockPort> = if config.wake_lock.enabled {
        Box::new(InhibitLog::default())
    } else {
        Box::new(NoWakeLock)
    };

    let mut engine = Engine::new(audio, wake_lock);
    engine.subscribe(renderer());
    engine.load(workout);

    print_controls();
    let input = spawn_input_reader();
    let (outcome, started_at) = drive(&mut engine, &input, &options, &mut log)?;

    let Some(started_at) = started_at else {
        if log.ended == 0 {
            println!("\nWorkout not started.");
        }
        return Ok(());
    };

    if outcome == SessionOutcome::Abandoned {
        println!(
            "\nStopped after {} of {} steps.",
            engine.completed_count(),
            log.total_steps
        );
    }

    log.record(started_at, engine.completed_count(), outcome)
}

/// Where a run's sessions go; no sink with `--no-history`
struct SessionLog {
    sink: Option<JsonlSink>,
    title: String,
    total_steps: usize,
    /// Sessions ended so far, recorded or not
    ended: usize,
}

impl SessionLog {
    fn record(
        &mut self,
        started_at: DateTime<Utc>,
        steps_completed: usize,
        outcome: SessionOutcome,
    ) -> Result<()> {
        self.ended += 1;
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        let record = SessionRecord::ended_now(
            self.title.clone(),
            started_at,
            steps_completed,
            self.total_steps,
            outcome,
        );
        sink.append(&record)?;
        println!("✓ Session logged!");
        Ok(())
    }
}

/// Host loop: owns the periodic timer and forwards user commands
///
/// Returns how the run ended and when it last started running. A reset
/// mid-run records the interrupted session as abandoned.
fn drive(
    engine: &mut Engine,
    input: &Receiver<UserCommand>,
    options: &RunOptions,
    log: &mut SessionLog,
) -> Result<(SessionOutcome, Option<DateTime<Utc>>)> {
    let mut started_at = None;
    let mut input_open = true;

    if options.autostart {
        engine.start();
    }
    let mut token = engine.ticker();
    let mut next_tick = Instant::now() + options.tick;

    let outcome = loop {
        if started_at.is_none() && engine.run_state() != RunState::Idle {
            started_at = Some(Utc::now());
        }

        if engine.run_state() == RunState::Complete {
            break SessionOutcome::Completed;
        }

        let on_reps = engine.current_step().map(|s| !s.is_timed()).unwrap_or(false);
        if options.auto_reps && on_reps && engine.run_state() == RunState::Running {
            engine.complete_reps();
            next_tick = Instant::now() + options.tick;
            continue;
        }

        let now = Instant::now();
        if now >= next_tick {
            engine.tick(token);
            next_tick += options.tick;
            if next_tick < now {
                next_tick = now + options.tick;
            }
            continue;
        }
        let wait = next_tick - now;

        let command = if input_open {
            match input.recv_timeout(wait) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Input closed");
                    input_open = false;
                    None
                }
            }
        } else {
            // Nobody can press a key any more: only a running countdown can finish.
            if engine.run_state() != RunState::Running || on_reps {
                break SessionOutcome::Abandoned;
            }
            thread::sleep(wait);
            None
        };

        match command {
            Some(
                command @ (UserCommand::Start
                | UserCommand::Pause
                | UserCommand::Skip
                | UserCommand::Done),
            ) => {
                if forward(engine, &command) {
                    next_tick = Instant::now() + options.tick;
                }
            }
            Some(UserCommand::Reset) => {
                if let Some(started) = started_at {
                    println!(
                        "\nReset after {} of {} steps.",
                        engine.completed_count(),
                        log.total_steps
                    );
                    log.record(started, engine.completed_count(), SessionOutcome::Abandoned)?;
                }
                engine.reset();
                token = engine.ticker();
                started_at = None;
            }
            Some(UserCommand::Quit) => break SessionOutcome::Abandoned,
            Some(UserCommand::Help) => print_controls(),
            Some(UserCommand::Unknown(text)) => {
                println!("\nUnknown command {:?}", text);
                print_controls();
            }
            None => {}
        }
    };

    Ok((outcome, started_at))
}

/// Hand a run control to the engine
///
/// Returns whether the run state or the step changed, which restarts the
/// countdown second. Ignored presses leave the pending tick alone.
fn forward(engine: &mut Engine, command: &UserCommand) -> bool {
    let before = (engine.run_state(), engine.current_index());
    match command {
        UserCommand::Start => engine.start(),
        UserCommand::Pause => engine.pause(),
        UserCommand::Skip => engine.skip(),
        UserCommand::Done => engine.complete_reps(),
        _ => return false,
    }
    (engine.run_state(), engine.current_index()) != before
}

fn cmd_history(data_dir: PathBuf, limit: usize) -> Result<()> {
    let path = data_dir.join(SESSION_LOG);
    let sessions = history::load_recent(&path, limit)?;

    if sessions.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    for session in sessions {
        let marker = match session.outcome {
            SessionOutcome::Completed => "✓",
            SessionOutcome::Abandoned => "✗",
        };
        println!(
            "{} {}  {}  {}/{} steps  {}",
            marker,
            session.finished_at.format("%Y-%m-%d %H:%M"),
            session.workout_title,
            session.steps_completed,
            session.total_steps,
            format_clock(u32::try_from(session.elapsed_seconds()).unwrap_or(u32::MAX)),
        );
    }

    Ok(())
}

fn cmd_stats(data_dir: PathBuf) -> Result<()> {
    let sessions = history::read_sessions(&data_dir.join(SESSION_LOG))?;
    let stats = Stats::from_sessions(&sessions, Utc::now().date_naive());

    if stats.total_workouts == 0 {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    println!(
        "Workouts: {} ({} completed)",
        stats.total_workouts, stats.completed_workouts
    );
    println!("Total time: {}", stats.formatted_total_time());
    println!("Steps completed: {}", stats.total_steps_completed);
    println!(
        "Streak: {} day{}",
        stats.streak_days,
        if stats.streak_days == 1 { "" } else { "s" }
    );
    if let Some(last) = stats.last_workout_date {
        println!("Last completed: {}", last.format("%Y-%m-%d"));
    }

    Ok(())
}

fn cmd_config(config: &Config, init: bool) -> Result<()> {
    let path = Config::default_config_path();

    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            Config::default().save_to(&path)?;
            println!("✓ Wrote default config to {}", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}

// ============================================================================
// Display
// ============================================================================

fn display_title(workout: &Workout) -> &str {
    if workout.title.is_empty() {
        "Workout"
    } else {
        &workout.title
    }
}

fn display_workout(workout: &Workout) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", display_title(workout));
    println!("╰─────────────────────────────────────────╯");
    println!();

    if workout.is_empty() {
        println!("  (no steps)");
        return;
    }

    for (index, step) in workout.steps.iter().enumerate() {
        println!("  {:>2}. {}  {}", index + 1, step.name, measure_label(step));
        if !step.is_rest() {
            for paragraph in step.paragraphs() {
                println!("        {}", paragraph);
            }
        }
    }

    let rep_steps = workout.steps.iter().filter(|s| !s.is_timed()).count();
    println!();
    print!(
        "  Total time: {}",
        format_clock(u32::try_from(workout.total_duration_seconds()).unwrap_or(u32::MAX))
    );
    if rep_steps > 0 {
        print!(" + {} rep-based step(s)", rep_steps);
    }
    println!();
}

fn measure_label(step: &Step) -> String {
    match step.measure {
        Measure::Time { seconds } => format_clock(seconds),
        Measure::Reps { count } => format!("{} reps", count),
    }
}

/// Subscriber that prints the live countdown
fn renderer() -> impl FnMut(&Snapshot) {
    let mut shown: Option<usize> = None;
    let mut last_run = RunState::Idle;

    move |snapshot: &Snapshot| {
        if snapshot.run == RunState::Complete {
            if last_run != RunState::Complete {
                println!("\n\n🎉 Workout complete! Great job!");
            }
            last_run = snapshot.run;
            return;
        }

        let Some(step) = snapshot.step.as_ref() else {
            return;
        };

        let fresh_start = snapshot.run == RunState::Idle && last_run != RunState::Idle;
        if shown != Some(snapshot.current_index) || fresh_start {
            shown = Some(snapshot.current_index);
            println!();
            println!("\n▶ {} · {}", snapshot.position_label, step.name);
            for paragraph in step.paragraphs() {
                println!("    {}", paragraph);
            }
        }

        if snapshot.run != last_run {
            match snapshot.run {
                RunState::Paused => println!("\n  ⏸ Paused"),
                RunState::Running if last_run == RunState::Paused => println!("  ▶ Resumed"),
                _ => {}
            }
            last_run = snapshot.run;
        }

        match step.measure {
            Measure::Time { .. } => print!(
                "\r  ⏱ {:>6} {}",
                format_clock(snapshot.remaining_seconds),
                progress_bar(snapshot.progress_fraction)
            ),
            Measure::Reps { count } => print!("\r  ✋ {} reps (d + Enter when done)", count),
        }
        let _ = io::stdout().flush();
    }
}

fn progress_bar(fraction: f64) -> String {
    const WIDTH: usize = 20;
    let filled = ((fraction.clamp(0.0, 1.0) * WIDTH as f64).round() as usize).min(WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(WIDTH - filled))
}

// ============================================================================
// Input
// ============================================================================

enum UserCommand {
    Start,
    Pause,
    Skip,
    Done,
    Reset,
    Quit,
    Help,
    Unknown(String),
}

impl UserCommand {
    fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "" | "s" | "start" => UserCommand::Start,
            "p" | "pause" => UserCommand::Pause,
            "n" | "skip" => UserCommand::Skip,
            "d" | "done" => UserCommand::Done,
            "r" | "reset" => UserCommand::Reset,
            "q" | "quit" => UserCommand::Quit,
            "h" | "?" | "help" => UserCommand::Help,
            other => UserCommand::Unknown(other.to_string()),
        }
    }
}

/// Read stdin lines on a separate thread; the channel closes at EOF
fn spawn_input_reader() -> Receiver<UserCommand> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(UserCommand::parse(&line)).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_controls() {
    println!("─────────────────────────────────────────");
    println!("Enter start/resume · p pause · n skip · d done (reps)");
    println!("r reset · q quit · h help");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_on(steps: Vec<Step>) -> Engine {
        let mut engine = Engine::new(Box::new(SilentAudio), Box::new(NoWakeLock));
        engine.load(Workout {
            title: "Test".into(),
            steps,
        });
        engine
    }

    #[test]
    fn test_repeated_start_keeps_pending_tick() {
        let mut engine = engine_on(vec![Step::timed("A", 30), Step::timed("B", 30)]);

        assert!(forward(&mut engine, &UserCommand::Start));
        assert!(!forward(&mut engine, &UserCommand::Start));
        assert!(!forward(&mut engine, &UserCommand::Start));
        assert_eq!(engine.remaining_seconds(), 30);
    }

    #[test]
    fn test_forward_reports_real_changes_only() {
        let mut engine = engine_on(vec![Step::timed("A", 30), Step::reps("B", 10)]);

        assert!(!forward(&mut engine, &UserCommand::Pause));
        assert!(!forward(&mut engine, &UserCommand::Skip));
        assert!(forward(&mut engine, &UserCommand::Start));
        assert!(!forward(&mut engine, &UserCommand::Done));
        assert!(forward(&mut engine, &UserCommand::Skip));
        assert!(forward(&mut engine, &UserCommand::Done));
        assert_eq!(engine.run_state(), RunState::Complete);
        assert!(!forward(&mut engine, &UserCommand::Help));
    }

    #[test]
    fn test_user_command_parsing() {
        assert!(matches!(UserCommand::parse(""), UserCommand::Start));
        assert!(matches!(UserCommand::parse(" P "), UserCommand::Pause));
        assert!(matches!(UserCommand::parse("n"), UserCommand::Skip));
        assert!(matches!(UserCommand::parse("xyz"), UserCommand::Unknown(t) if t == "xyz"));
    }
}
