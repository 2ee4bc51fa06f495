mod process;

use std::fs;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use flipbridge_core::{
    AudioCache, Bridge, BridgeConfig, HostIntent, LocalProbe, LoopbackSurface, SessionController,
    SessionEvent, Status, SurfaceTransport,
};
use flipbridge_tty::{
    failure_notice, format_status, write_status_line, EventMapper, TerminalBell, UiEvent,
};
use process::ProcessSurface;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_DEMO_PAGES: u32 = 12;

#[derive(Debug, Parser)]
#[command(
    name = "flipbridge",
    version,
    about = "Host bridge for sandboxed flipbook document viewers"
)]
struct Args {
    /// Document to load (local path or URL)
    document: String,

    /// Viewer program hosting the surface; receives the viewer URL as its last argument
    #[arg(long = "surface", conflicts_with = "demo_pages")]
    surface: Option<String>,

    /// Extra arguments passed to the viewer program before the URL
    #[arg(long = "surface-arg", requires = "surface")]
    surface_args: Vec<String>,

    /// Use the built-in simulated flipbook with this many pages
    #[arg(long = "demo-pages")]
    demo_pages: Option<u32>,

    /// Configuration file (defaults to config.toml in the platform config directory)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Override the load timeout in seconds
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    /// Start with the page-turn sound disabled
    #[arg(long = "mute")]
    mute: bool,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("org", "flipbridge", "flipbridge")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config = load_config(&args, &project_dirs)?;
    let _log_guard = init_logging(&project_dirs)?;
    info!(document = %args.document, ?config, "starting viewer bridge");

    let (surface_tx, surface_rx) = mpsc::unbounded_channel();
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(args.document.clone(), config.clone());
    let audio = AudioCache::new(TerminalBell::new(io::stdout()), config.audio_cache_capacity);

    match args.surface {
        Some(program) => {
            let transport = ProcessSurface::new(program, args.surface_args, surface_tx);
            let bridge = Bridge::new(controller, transport, audio, surface_rx, intent_rx);
            run_viewer(bridge, intent_tx).await
        }
        None => {
            let pages = args.demo_pages.unwrap_or(DEFAULT_DEMO_PAGES);
            let transport = LoopbackSurface::new(surface_tx, pages);
            let bridge = Bridge::new(controller, transport, audio, surface_rx, intent_rx);
            run_viewer(bridge, intent_tx).await
        }
    }
}

fn load_config(args: &Args, project_dirs: &ProjectDirs) -> Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        None => {
            let path = project_dirs.config_dir().join("config.toml");
            BridgeConfig::load_or_default(&path)
                .with_context(|| format!("failed to load config {:?}", path))?
        }
    };
    if let Some(secs) = args.timeout_secs {
        config.load_timeout = Duration::from_secs(secs);
    }
    if args.mute {
        config.audio_enabled = false;
    }
    Ok(config.normalized())
}

type TerminalBridge<T> = Bridge<T, TerminalBell<Stdout>>;

async fn run_viewer<T: SurfaceTransport>(
    mut bridge: TerminalBridge<T>,
    intents: UnboundedSender<HostIntent>,
) -> Result<()> {
    bridge.start(&LocalProbe).await?;

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;

    let mut keys = spawn_key_reader();
    let mut event_mapper = EventMapper::new();
    let events = bridge.events();
    let mut notice: Option<Vec<String>> = None;
    let mut dirty = true;
    let mut keys_open = true;

    loop {
        for event in events.lock().drain(..) {
            match event {
                SessionEvent::LoadFailed {
                    message, announce, ..
                } if announce => {
                    notice = Some(failure_notice(&message, bridge.session().document_url()));
                }
                SessionEvent::StatusChanged { to, .. } if to != Status::Error => {
                    notice = None;
                }
                _ => {}
            }
            dirty = true;
        }

        if dirty {
            let pending = event_mapper.pending_input();
            let status = combine_status(format_status(bridge.session()), pending.as_deref());
            redraw(&mut stdout, &status, notice.as_deref())?;
            dirty = false;
        }

        tokio::select! {
            input = bridge.next_input() => match input {
                Some(input) => {
                    bridge.handle(input).await?;
                    dirty = true;
                }
                None => break,
            },
            key = keys.recv(), if keys_open => match key {
                Some(ev) => {
                    forward_ui_event(event_mapper.map_event(ev), &intents);
                    dirty = true;
                }
                None => {
                    warn!("terminal input closed");
                    keys_open = false;
                    let _ = intents.send(HostIntent::Shutdown);
                }
            },
        }
    }

    crossterm::execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    Ok(())
}

fn forward_ui_event(event: UiEvent, intents: &UnboundedSender<HostIntent>) {
    let sent = match event {
        UiEvent::Navigate { direction, count } => intents
            .send(HostIntent::NavigateBy {
                direction,
                count: u32::try_from(count).unwrap_or(u32::MAX),
            })
            .is_ok(),
        UiEvent::Intent(intent) => intents.send(intent).is_ok(),
        UiEvent::Quit => intents.send(HostIntent::Shutdown).is_ok(),
        UiEvent::None => true,
    };
    if !sent {
        warn!("viewer bridge stopped accepting intents");
    }
}

/// Reads terminal events on a dedicated thread until the receiver goes away.
fn spawn_key_reader() -> UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || loop {
        if tx.is_closed() {
            break;
        }
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(?err, "failed to read terminal event");
                    break;
                }
            },
            Ok(false) => {}
            Err(err) => {
                warn!(?err, "failed to poll terminal events");
                break;
            }
        }
    });
    rx
}

fn combine_status(base: String, pending_input: Option<&str>) -> String {
    match pending_input.filter(|s| !s.is_empty()) {
        Some(pending) => format!("{base} | {pending}"),
        None => base,
    }
}

fn truncate_to_width(text: &str, cols: usize) -> &str {
    match text.char_indices().nth(cols) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn redraw(stdout: &mut Stdout, status: &str, notice: Option<&[String]>) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    let cols = usize::from(cols.max(1));
    crossterm::execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    if let Some(lines) = notice {
        for (row, line) in lines.iter().enumerate() {
            let row = u16::try_from(row).unwrap_or(u16::MAX);
            crossterm::execute!(
                stdout,
                cursor::MoveTo(0, row),
                Print(truncate_to_width(line, cols))
            )?;
        }
    }
    crossterm::execute!(
        stdout,
        cursor::MoveTo(0, rows.saturating_sub(1)),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(stdout, truncate_to_width(status, cols))?;
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "flipbridge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbridge_core::Direction;

    #[test]
    fn combine_status_appends_pending_digits() {
        assert_eq!(
            combine_status("a.pdf | page 2 of 9".into(), Some("12")),
            "a.pdf | page 2 of 9 | 12"
        );
        assert_eq!(combine_status("a.pdf | idle".into(), Some("")), "a.pdf | idle");
        assert_eq!(combine_status("a.pdf | idle".into(), None), "a.pdf | idle");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_to_width("päge 1", 2), "pä");
        assert_eq!(truncate_to_width("short", 40), "short");
    }

    #[test]
    fn navigation_count_travels_as_one_intent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_ui_event(
            UiEvent::Navigate {
                direction: Direction::Next,
                count: usize::MAX,
            },
            &tx,
        );
        forward_ui_event(UiEvent::Quit, &tx);
        let mut received = Vec::new();
        while let Ok(intent) = rx.try_recv() {
            received.push(intent);
        }
        assert_eq!(
            received,
            vec![
                HostIntent::NavigateBy {
                    direction: Direction::Next,
                    count: u32::MAX,
                },
                HostIntent::Shutdown,
            ]
        );
    }

    #[test]
    fn cli_overrides_apply_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "load_timeout_ms = 5000\nvolume = 0.8\n").unwrap();
        let args = Args::parse_from([
            "flipbridge",
            "doc.pdf",
            "--config",
            path.to_str().unwrap(),
            "--timeout-secs",
            "30",
            "--mute",
        ]);
        let dirs = ProjectDirs::from("org", "flipbridge", "flipbridge").unwrap();
        let config = load_config(&args, &dirs).unwrap();
        assert_eq!(config.load_timeout, Duration::from_secs(30));
        assert!(!config.audio_enabled);
        assert!((config.volume - 0.8).abs() < f32::EPSILON);
    }
}
