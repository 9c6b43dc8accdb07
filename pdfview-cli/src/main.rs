mod app;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

use pdfview_core::config::CONFIG_FILE_NAME;
use pdfview_core::{DocumentMetadata, EmbeddedFile, Session, ViewerConfig};
use pdfview_render::PdfiumProvider;
use pdfview_tty::{KittyRenderer, UiEvent, Viewport};

use crate::app::{App, LoopAction};

#[derive(Debug, Parser)]
#[command(
    name = "pdfview",
    version,
    about = "PDF viewer and annotator for kitty-compatible terminals"
)]
struct Args {
    /// PDF file to open
    file: PathBuf,

    /// Page to open on (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,

    /// Configuration file to use instead of the default location
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print document metadata as JSON and exit
    #[arg(long, conflicts_with_all = ["list_attachments", "extract_attachment"])]
    metadata: bool,

    /// Print the embedded files as JSON and exit
    #[arg(long, conflicts_with = "extract_attachment")]
    list_attachments: bool,

    /// Write the named embedded file to --output and exit
    #[arg(long, value_name = "NAME", requires = "output")]
    extract_attachment: Option<String>,

    /// Destination for --extract-attachment
    #[arg(short = 'o', long, value_name = "PATH", requires = "extract_attachment")]
    output: Option<PathBuf>,
}

impl Args {
    fn is_batch(&self) -> bool {
        self.metadata || self.list_attachments || self.extract_attachment.is_some()
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), cursor::Hide, EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(
            stdout,
            DisableMouseCapture,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0),
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

#[derive(Serialize)]
struct MetadataReport<'a> {
    path: &'a Path,
    page_count: usize,
    metadata: &'a DocumentMetadata,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ViewerConfig::project_dirs()
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join(CONFIG_FILE_NAME));
    let config = ViewerConfig::load(&config_path);
    let _log_guard = init_logging(&project_dirs, &config.log_level)?;
    info!(config = %config_path.display(), file = %args.file.display(), "starting");

    let provider = Arc::new(PdfiumProvider::new().context("failed to load pdfium")?);
    let session = Session::with_zoom(provider, config.initial_zoom);

    if args.is_batch() {
        return run_batch(&args, session);
    }
    run_interactive(args, session, &config)
}

/// Non-interactive commands: read the document, print or write, exit.
fn run_batch(args: &Args, mut session: Session) -> Result<()> {
    session
        .open(&args.file, args.password.as_deref())
        .with_context(|| format!("failed to open {:?}", args.file))?;

    if args.metadata {
        let info = session
            .info()
            .ok_or_else(|| anyhow!("document has no info"))?;
        let report = MetadataReport {
            path: &info.path,
            page_count: info.page_count,
            metadata: &info.metadata,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if args.list_attachments {
        let files: Vec<EmbeddedFile> = session.embedded_files()?;
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if let (Some(name), Some(output)) = (&args.extract_attachment, &args.output) {
        let bytes = session
            .save_attachment(name, output)
            .with_context(|| format!("failed to extract {name:?}"))?;
        eprintln!("wrote {bytes} bytes to {}", output.display());
    }
    Ok(())
}

fn run_interactive(args: Args, session: Session, config: &ViewerConfig) -> Result<()> {
    let _raw = RawModeGuard::new()?;
    let mut app = App::new(session, config, current_viewport()?);
    let mut renderer = KittyRenderer::new(io::stdout());

    let mut action = app.open_initial(args.file, args.password, args.page)?;
    loop {
        match action {
            LoopAction::Quit => break,
            LoopAction::Redraw => app.redraw(&mut renderer)?,
            LoopAction::Status => app.draw_status(&mut renderer)?,
            LoopAction::Continue => {}
        }
        action = LoopAction::Continue;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let ui_event = app.mapper_mut().map_event(event::read()?);
        if ui_event == UiEvent::Resize {
            let window = terminal::window_size()?;
            app.viewport_mut()
                .resize(window.columns, window.rows, window.width, window.height);
        }
        action = app.handle_event(ui_event)?;
    }

    renderer.delete_image()?;
    info!("exiting");
    Ok(())
}

fn current_viewport() -> Result<Viewport> {
    match terminal::window_size() {
        Ok(window) => Ok(Viewport::new(
            window.columns,
            window.rows,
            window.width,
            window.height,
        )),
        Err(err) => {
            warn!(%err, "terminal pixel size unavailable");
            let (columns, rows) = terminal::size()?;
            Ok(Viewport::new(columns, rows, 0, 0))
        }
    }
}

fn init_logging(project_dirs: &ProjectDirs, default_level: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {log_dir:?}"))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pdfview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

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
