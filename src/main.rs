use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use faultwatch::app::{App, AppFeeds};
use faultwatch::ingest::{spawn_poller, IngestFeeds, Submission};
use faultwatch::{
    events, logging, store, ui, AdvisoryClient, Alert, AlertNotifier, DeviceSource, EventLog,
    IngestEvent, IngestHandle, Ingestor, InputSource, JsonLinesMirror, ManualSource, Origin,
    Settings,
};

#[derive(Parser, Debug)]
#[command(name = "faultwatch", version)]
#[command(about = "Monitor binary machine status words, log every reading and alert on faults")]
struct Args {
    /// Settings file (TOML). Defaults to ./faultwatch.toml if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV event log path
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Device node or file to read newline-delimited status words from
    #[arg(short, long, conflicts_with = "connect")]
    device: Option<PathBuf>,

    /// TCP endpoint streaming status words (host:port)
    #[arg(short, long, conflicts_with = "device")]
    connect: Option<String>,

    /// Device poll interval (e.g., "1s", "500ms")
    #[arg(short, long)]
    poll: Option<String>,

    /// Do not ring the terminal bell on faults
    #[arg(long)]
    no_bell: bool,

    /// Run without the TUI; manual status words are read from stdin
    #[arg(long, conflicts_with_all = ["submit", "export"])]
    headless: bool,

    /// Record a single status word and exit
    #[arg(short, long, conflicts_with = "export")]
    submit: Option<String>,

    /// Export the event log (.csv, .json or .xlsx) and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(ref log) = self.log {
            settings.log_path = log.clone();
        }
        if let Some(ref poll) = self.poll {
            settings.poll_interval = poll.clone();
        }
        if self.no_bell {
            settings.bell = false;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.settings()?;

    // Handle export mode (non-interactive)
    if let Some(ref dest) = args.export {
        logging::init_stderr()?;
        let summary = store::export(&settings.log_path, dest)?;
        println!(
            "Exported {} rows ({}) to {}",
            summary.rows,
            summary.format.label(),
            dest.display()
        );
        return Ok(());
    }

    let rt = Runtime::new()?;

    if let Some(ref token) = args.submit {
        logging::init_stderr()?;
        return rt.block_on(submit_once(&settings, token));
    }

    if args.headless {
        logging::init_stderr()?;
        return rt.block_on(run_headless(&settings, &args));
    }

    logging::init_file(&settings.trace_path)?;
    run_tui(&rt, &settings, &args)
}

/// The running ingestion pipeline.
struct Pipeline {
    handle: IngestHandle,
    ingest_task: JoinHandle<()>,
    poller: Option<JoinHandle<()>>,
    feeds: IngestFeeds,
    alerts: watch::Receiver<Option<Alert>>,
    source_description: String,
    source_note: Option<String>,
}

impl Pipeline {
    /// Stop polling and let the loop drain what is already queued.
    async fn shutdown(poller: Option<JoinHandle<()>>, ingest_task: JoinHandle<()>) {
        if let Some(poller) = poller {
            poller.abort();
        }
        if tokio::time::timeout(Duration::from_secs(5), ingest_task).await.is_err() {
            tracing::warn!("ingestion loop did not drain in time");
        }
    }
}

/// Pick the input source. A device that cannot be opened falls back to
/// manual entry instead of aborting.
async fn open_source(args: &Args) -> Box<dyn InputSource> {
    let opened = if let Some(ref path) = args.device {
        DeviceSource::open(path).await
    } else if let Some(ref addr) = args.connect {
        DeviceSource::connect(addr).await
    } else {
        return Box::new(ManualSource::new());
    };

    match opened {
        Ok(source) => Box::new(source),
        Err(e) => {
            let reason = format!("{:#}", e);
            tracing::warn!(error = %reason, "device unavailable, using manual entry");
            Box::new(ManualSource::fallback(reason))
        }
    }
}

/// Open the log and build the ingestor with its collaborators.
fn build_ingestor(settings: &Settings) -> Result<(Ingestor, IngestFeeds, watch::Receiver<Option<Alert>>)> {
    let log = EventLog::open(&settings.log_path)?;
    let advisory = AdvisoryClient::from_settings(&settings.advisory)?;
    tracing::info!(advisory = advisory.description(), "advisory backend");
    let (notifier, alerts) = AlertNotifier::new(settings.bell);

    let (mut ingestor, feeds) = Ingestor::new(log, advisory, Box::new(notifier), settings.window_size)
        .with_context(|| format!("Failed to open event log {}", settings.log_path.display()))?;
    ingestor = ingestor.with_append_attempts(settings.append_attempts);
    if let Some(path) = settings.mirror_path() {
        ingestor = ingestor.with_mirror(Box::new(JsonLinesMirror::new(path)));
    }
    Ok((ingestor, feeds, alerts))
}

async fn start_pipeline(settings: &Settings, source: Box<dyn InputSource>) -> Result<Pipeline> {
    let (ingestor, feeds, alerts) = build_ingestor(settings)?;
    let (handle, ingest_task) = ingestor.spawn(settings.queue_capacity);

    let source_description = source.description().to_string();
    let source_note = source.error();
    let poller = if source.is_live() {
        Some(spawn_poller(source, settings.poll_interval()?, handle.clone()))
    } else {
        None
    };

    Ok(Pipeline {
        handle,
        ingest_task,
        poller,
        feeds,
        alerts,
        source_description,
        source_note,
    })
}

/// Record one status word through the full pipeline, synchronously.
async fn submit_once(settings: &Settings, token: &str) -> Result<()> {
    let (mut ingestor, mut feeds, _alerts) = build_ingestor(settings)?;
    let submission = Submission {
        token: token.to_string(),
        origin: Origin::Manual,
    };
    let reading = ingestor.process(submission).await?;

    while let Ok(event) = feeds.events.try_recv() {
        if let IngestEvent::MirrorFailed { error } = event {
            eprintln!("warning: mirror not updated: {}", error);
        }
    }

    println!(
        "{} {} {}{}",
        reading.timestamp_text(),
        reading.raw_token(),
        reading.classification(),
        reading.advisory().map(|a| format!(" ({})", a)).unwrap_or_default()
    );
    Ok(())
}

/// Run the pipeline without a UI until stdin closes (manual entry) or
/// Ctrl-C (live device).
async fn run_headless(settings: &Settings, args: &Args) -> Result<()> {
    let source = open_source(args).await;
    let Pipeline {
        handle,
        ingest_task,
        poller,
        mut feeds,
        source_description,
        ..
    } = start_pipeline(settings, source).await?;
    tracing::info!(source = %source_description, log = %settings.log_path.display(), "running headless");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    if handle.submit(line, Origin::Manual).await.is_err() {
                        bail!("ingestion loop stopped unexpectedly");
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    stdin_open = false;
                    if poller.is_none() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    stdin_open = false;
                    if poller.is_none() {
                        break;
                    }
                }
            },
            Some(event) = feeds.events.recv() => {
                if let IngestEvent::Ingested { reading, .. } = event {
                    println!("{} {} {}", reading.timestamp_text(), reading.raw_token(), reading.classification());
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(handle);
    Pipeline::shutdown(poller, ingest_task).await;
    Ok(())
}

/// Run the TUI with the given settings
fn run_tui(rt: &Runtime, settings: &Settings, args: &Args) -> Result<()> {
    let pipeline = rt.block_on(async {
        let source = open_source(args).await;
        start_pipeline(settings, source).await
    })?;

    let Pipeline {
        handle,
        ingest_task,
        poller,
        feeds,
        alerts,
        source_description,
        source_note,
    } = pipeline;

    let app_feeds = AppFeeds {
        handle,
        window: feeds.window,
        alerts,
        events: feeds.events,
    };
    let mut app = App::new(app_feeds, source_description, &settings.log_path, settings.window_size)
        .with_source_note(source_note);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Dropping the app drops the last manual handle.
    drop(app);
    rt.block_on(Pipeline::shutdown(poller, ingest_task));

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.refresh();
        terminal.draw(|frame| ui::draw(frame, app))?;

        // Poll for events with a short timeout
        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }
    }

    Ok(())
}
