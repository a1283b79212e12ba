//! Waypoint journey daemon
//!
//! Runs one journey conversation in the terminal. The two agents talk while
//! the journey advances on a timer. Commands on stdin:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `go ORIGIN -> DESTINATION` | Select (or replace) the journey |
//! | `say TEXT` | Ask the assistant directly, outside the agent conversation |
//! | `pause` / `resume` | Suspend or continue the agents and their audio |
//! | `status` | Print journey progress and session state |
//! | `restart` | Clear the conversation and start again with Agent1 |
//! | `quit` | Exit |
//!
//! Usage: `waypoint-daemon [ORIGIN] [DESTINATION]` (falls back to the
//! `origin`/`destination` config keys; with neither, the agents wait for `go`).

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypoint_core::{
    ConversationOrchestrator, CoreError, CoreResult, DialogueGenerator, DisplaySink, GeminiGenerator,
    IntervalTicker, JourneyProgressTracker, JourneyState, MockGenerator, OrchestratorConfig,
    PauseResumeController, ReasoningStore, RouteTable, Sender, SessionHandle, Ticker, WaypointConfig,
};

/// How long shutdown waits for the current turn before aborting the driver.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Prints conversation lines to stdout.
struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn show(&self, sender: Sender, text: &str) -> CoreResult<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "[{}] {}", sender.label(), text)
            .and_then(|_| out.flush())
            .map_err(|e| CoreError::Display(e.to_string()))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[waypoint-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "waypoint daemon failed");
            eprintln!("[waypoint-daemon] {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CoreResult<()> {
    let config = WaypointConfig::load()?;
    let table = RouteTable::load(&config.route_table_path)?;
    let reasoning = match ReasoningStore::load(&config.reasoning_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(path = %config.reasoning_path, error = %e, "Reasoning data unavailable; agents will improvise");
            ReasoningStore::default()
        }
    };

    let mut args = std::env::args().skip(1);
    let origin = args.next().or_else(|| config.origin.clone());
    let destination = args.next().or_else(|| config.destination.clone());

    let session = SessionHandle::new(Arc::new(ConsoleDisplay));
    let mut tracker = JourneyProgressTracker::new().with_listener(Arc::new(session.clone()));
    let journey_view = tracker.subscribe();
    let orchestrator = Arc::new(ConversationOrchestrator::new(
        OrchestratorConfig::from(&config),
        session.clone(),
        build_generator(&config),
        waypoint_voice::speech_or_silent(&config.tts_mode),
        Arc::new(reasoning),
        tracker.subscribe(),
    ));

    match (origin, destination) {
        (Some(origin), Some(destination)) => {
            orchestrator.select_journey(&mut tracker, &table, &origin, &destination)?;
        }
        _ => tracing::info!(
            locations = ?table.locations(),
            "No journey selected; type `go ORIGIN -> DESTINATION` to start one"
        ),
    }

    tracing::info!(
        city = %config.city,
        routes = table.len(),
        segment_interval_ms = config.timing.segment_interval_ms,
        "Waypoint daemon started"
    );
    orchestrator.start();

    let driver = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run().await }
    });
    let (selections, selection_rx) = mpsc::channel(4);
    let journey = tokio::spawn(journey_loop(
        tracker,
        Arc::clone(&orchestrator),
        table,
        selection_rx,
        config.timing.segment_interval(),
    ));

    let controller = orchestrator.controller();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let command = parse_command(&line);
                    if !handle_command(command, &orchestrator, &controller, &journey_view, &selections).await {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed; CTRL-C to stop");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed; CTRL-C to stop");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down daemon");
                break;
            }
        }
    }

    session.stop();
    journey.abort();
    let abort = driver.abort_handle();
    if tokio::time::timeout(SHUTDOWN_GRACE, driver).await.is_err() {
        tracing::warn!("Conversation turn still running; aborting");
        abort.abort();
    }
    Ok(())
}

/// Gemini when configured and keyed, otherwise the offline generator.
fn build_generator(config: &WaypointConfig) -> Arc<dyn DialogueGenerator> {
    if !config.llm_is_mock() {
        if let Some(gemini) = GeminiGenerator::from_env(config.gemini_model()) {
            tracing::info!(model = config.gemini_model(), "Dialogue: Gemini");
            return Arc::new(gemini);
        }
        tracing::warn!("GEMINI_API_KEY not set; falling back to mock dialogue");
    }
    Arc::new(MockGenerator::new())
}

/// A journey selection typed on stdin.
struct Selection {
    origin: String,
    destination: String,
}

/// Owns the tracker: advances it on the segment interval while the journey is
/// active and applies new selections, restarting the interval on each.
async fn journey_loop(
    mut tracker: JourneyProgressTracker,
    orchestrator: Arc<ConversationOrchestrator>,
    table: RouteTable,
    mut selections: mpsc::Receiver<Selection>,
    period: Duration,
) {
    let mut ticker = IntervalTicker::new(period);
    loop {
        let active = tracker.state().is_active();
        tokio::select! {
            selection = selections.recv() => {
                let Some(Selection { origin, destination }) = selection else {
                    break;
                };
                match orchestrator.change_journey(&mut tracker, &table, &origin, &destination) {
                    Ok(_) => ticker = IntervalTicker::new(period),
                    Err(e) => {
                        tracing::warn!(origin = %origin, destination = %destination, error = %e, "Journey selection rejected");
                        println!("[System] {}", e);
                    }
                }
            }
            _ = ticker.tick(), if active => {
                tracker.advance();
            }
        }
    }
    tracing::debug!("Journey loop stopped");
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Empty,
    Go { origin: String, destination: String },
    Say(String),
    Pause,
    Resume,
    Status,
    Restart,
    Quit,
    Usage(&'static str),
    Unknown(String),
}

const GO_USAGE: &str = "Usage: go ORIGIN -> DESTINATION";

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "go" => {
            let split = rest.split_once("->").or_else(|| rest.split_once('→'));
            match split {
                Some((origin, destination))
                    if !origin.trim().is_empty() && !destination.trim().is_empty() =>
                {
                    Command::Go {
                        origin: origin.trim().to_string(),
                        destination: destination.trim().to_string(),
                    }
                }
                _ => Command::Usage(GO_USAGE),
            }
        }
        "say" if rest.is_empty() => Command::Usage("Usage: say TEXT"),
        "say" => Command::Say(rest.to_string()),
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "status" => Command::Status,
        "restart" => Command::Restart,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Returns `false` when the daemon should exit.
async fn handle_command(
    command: Command,
    orchestrator: &Arc<ConversationOrchestrator>,
    controller: &PauseResumeController,
    journey: &watch::Receiver<JourneyState>,
    selections: &mpsc::Sender<Selection>,
) -> bool {
    match command {
        Command::Empty => {}
        Command::Go { origin, destination } => {
            if selections.send(Selection { origin, destination }).await.is_err() {
                tracing::warn!("Journey loop is gone; selection dropped");
            }
        }
        Command::Say(text) => {
            // Replies can take a while; keep reading commands meanwhile.
            let orchestrator = Arc::clone(orchestrator);
            tokio::spawn(async move {
                orchestrator.chat(&text).await;
            });
        }
        Command::Pause => {
            if !controller.pause() {
                println!("Already paused.");
            }
        }
        Command::Resume => {
            if controller.resume().is_none() {
                println!("Not paused.");
            }
        }
        Command::Status => {
            let progress = journey.borrow().progress_text();
            let snapshot = orchestrator.session().snapshot();
            if progress.is_empty() {
                println!("No journey selected.");
            } else {
                println!("{}", progress);
            }
            println!(
                "paused: {}  halted: {}  next: {}  messages: {}",
                snapshot.paused,
                snapshot.halted,
                snapshot.next_speaker,
                snapshot.log.len()
            );
        }
        Command::Restart => {
            orchestrator.start();
        }
        Command::Quit => return false,
        Command::Usage(usage) => println!("{}", usage),
        Command::Unknown(other) => println!(
            "Unknown command '{}'. Try go, say, pause, resume, status, restart or quit.",
            other
        ),
    }
    true
}
