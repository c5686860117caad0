use std::sync::Arc;
use std::time::Duration;

use notifier_core::config::NotifierCfg;
use notifier_core::coordinator::{Collaborators, CoordinatorHandle, MonitoringCoordinator};
use notifier_core::sim::{SimLocation, SimNotifier, SimObserver, SimWakeBackend};
use notifier_core::store::FileFlagStore;
use notifier_core::types::{LocationAuthorization, MonitorStatus};
use notifier_core::wake::WAKE_IDENTIFIER;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const WAKE_CLOCK_TICK: Duration = Duration::from_secs(1);
const LOG_PATH: &str = "/tmp/online-notifier.log";

const HELP: &str = "\
commands:
  toggle | on | off      switch monitoring
  online | offline       change the network path (pushed to the observer)
  silent-online          change the path without notifying (suspended process)
  bg | fg                app entered background / foreground
  wake                   fire the periodic wake now
  move                   deliver a location-change signal
  check                  run one connectivity check
  status                 print current state
  config                 print settings
  /q                     quit";

/// Host-side handles to the simulated platform.
struct Platform {
    observer: Arc<SimObserver>,
    location: Arc<SimLocation>,
    wake: Arc<SimWakeBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to a file so the prompt stays readable.
    if std::env::var("RUST_LOG").is_ok() {
        let file = std::fs::File::create(LOG_PATH)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
    }

    let cfg = NotifierCfg::from_env();
    let store = Arc::new(FileFlagStore::open(&cfg.store_path)?);
    tracing::info!(store = %store.path().display(), "flag store ready");

    let platform = Platform {
        observer: Arc::new(SimObserver::new(true)),
        location: Arc::new(SimLocation::new(LocationAuthorization::NotDetermined)),
        wake: Arc::new(SimWakeBackend::new()),
    };
    let collab = Collaborators {
        store,
        observer: platform.observer.clone(),
        notifications: Arc::new(SimNotifier::console()),
        location: platform.location.clone(),
        wake: platform.wake.clone(),
    };

    let handle = MonitoringCoordinator::spawn(&cfg, collab);
    let token = handle.token();
    spawn_signal_canceler(token.clone());
    platform
        .wake
        .clone()
        .spawn_clock(WAKE_CLOCK_TICK, cfg.wake_budget(), token.clone());

    let result = run_repl(&handle, &platform, &cfg, token.clone()).await;
    handle.shutdown();
    result
}

async fn run_repl(
    handle: &CoordinatorHandle,
    platform: &Platform,
    cfg: &NotifierCfg,
    token: CancellationToken,
) -> anyhow::Result<()> {
    println!("online-notifier (type `help`)");
    print_status(&handle.status());

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    spawn_input_thread(line_tx, ready_rx);
    request_next_prompt(&ready_tx);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            line = line_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match line {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        if matches!(text, "/q" | "/exit" | "/quit") {
                            break;
                        }
                        if !text.is_empty() {
                            run_command(text, handle, platform, cfg).await?;
                        }
                        request_next_prompt(&ready_tx);
                    }
                    InputEvent::Interrupted => {
                        token.cancel();
                        break;
                    }
                    InputEvent::Eof => break,
                    InputEvent::Error(err) => {
                        eprintln!("input error: {err}");
                        break;
                    }
                }
            }
        }
    }
    drop(ready_tx);
    println!();
    Ok(())
}

async fn run_command(
    text: &str,
    handle: &CoordinatorHandle,
    platform: &Platform,
    cfg: &NotifierCfg,
) -> anyhow::Result<()> {
    match text {
        "help" | "?" => println!("{HELP}"),
        "config" => {
            for (key, value, desc) in cfg.to_entries() {
                println!("  {key} = {value}  ({desc})");
            }
            return Ok(());
        }
        "toggle" => {
            handle.toggle().await?;
        }
        "on" => {
            handle.enable().await?;
        }
        "off" => {
            handle.disable().await?;
        }
        "online" => platform.observer.set_connected(true),
        "offline" => platform.observer.set_connected(false),
        "silent-online" => platform.observer.set_snapshot(true),
        "bg" => handle.enter_background().await?,
        "fg" => handle.enter_foreground().await?,
        "wake" => match platform.wake.fire(WAKE_IDENTIFIER, None) {
            Some(outcome) => println!("wake finished: {:?}", outcome.await?),
            None => println!("no wake handler registered"),
        },
        "move" => {
            if !platform.location.signal() {
                println!("location source not running");
            }
        }
        "check" => println!("check: {:?}", handle.check_now().await?),
        "status" => {}
        other => {
            println!("unknown command `{other}` (type `help`)");
            return Ok(());
        }
    }
    // Let observer pushes settle before reporting.
    tokio::time::sleep(Duration::from_millis(10)).await;
    print_status(&handle.status());
    if let Some(next) = platform.wake.pending(WAKE_IDENTIFIER) {
        println!("  next wake no earlier than {}", next.earliest_begin);
    }
    Ok(())
}

fn print_status(status: &MonitorStatus) {
    println!(
        "  monitoring={} connected={} location={:?} notifications={}",
        if status.monitoring_enabled { "on" } else { "off" },
        status.is_connected,
        status.location_auth,
        if status.notifications_authorized { "allowed" } else { "not allowed" },
    );
}

fn request_next_prompt(ready_tx: &std::sync::mpsc::Sender<()>) {
    let _ = ready_tx.send(());
}

fn spawn_input_thread(
    line_tx: mpsc::UnboundedSender<InputEvent>,
    ready_rx: std::sync::mpsc::Receiver<()>,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while ready_rx.recv().is_ok() {
            match editor.readline("notifier> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}

/// Cancel on SIGINT or SIGTERM.
fn spawn_signal_canceler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let (Ok(mut sigint), Ok(mut sigterm)) =
                (signal(SignalKind::interrupt()), signal(SignalKind::terminate()))
            else {
                tracing::warn!("failed to register signal handlers");
                return;
            };
            tokio::select! {
                _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }
            token.cancel();
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        }
    });
}
