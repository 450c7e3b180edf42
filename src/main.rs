use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use docview::document::{
    DirectoryStore, DocumentDecoder, DocumentHandle, FixtureDecoder, PageSize,
};
use docview::settings;
use docview::viewer::{
    DocumentIndex, FitViewport, HighlightOverlay, ListenerTable, OverlayInput, PageViewport,
    Rotation, ViewerShell, ViewerStatus, compute_fit,
};

const LOG_FILE: &str = "docview.log";
const WAIT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "docview", version, about = "Document viewport engine")]
struct Cli {
    /// Overrides the log level from the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every match of a query in a fixture document
    Search { fixture: PathBuf, query: String },

    /// Compute the zoom level that fits a page into a viewport
    Fit {
        #[arg(long)]
        page_width: f32,
        #[arg(long)]
        page_height: f32,
        #[arg(long)]
        viewport_width: f32,
        #[arg(long)]
        viewport_height: f32,
        /// Width taken by a side panel
        #[arg(long, default_value_t = 0.0)]
        reserved: f32,
    },

    /// Print the projected text spans of one page
    Overlay {
        fixture: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rotation: i32,
        #[arg(long)]
        query: Option<String>,
    },

    /// Open a document from a fixture directory in a headless viewer
    View {
        store: PathBuf,
        doc_id: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1600.0)]
        width: f32,
        #[arg(long, default_value_t = 900.0)]
        height: f32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings first: they carry the default log level.
    settings::load_settings(cli.config.as_deref());
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(settings::get_log_level)
        .parse()
        .unwrap_or(LevelFilter::Info);
    WriteLogger::init(
        level,
        Config::default(),
        File::create(LOG_FILE).with_context(|| format!("creating {LOG_FILE}"))?,
    )?;

    info!("Starting docview");
    let result = run(cli.command);
    if let Err(err) = &result {
        error!("Command failed: {err:?}");
    }
    info!("Shutting down docview");
    result
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Search { fixture, query } => search(&fixture, &query),
        Command::Fit {
            page_width,
            page_height,
            viewport_width,
            viewport_height,
            reserved,
        } => {
            let level = compute_fit(
                PageSize::new(page_width, page_height),
                FitViewport {
                    width: viewport_width,
                    height: viewport_height,
                    reserved_width: reserved,
                },
                settings::current().fit_params(),
            );
            println!("{level:.4} ({}%)", (level * 100.0).round());
            Ok(())
        }
        Command::Overlay {
            fixture,
            page,
            zoom,
            rotation,
            query,
        } => overlay(&fixture, page, zoom, rotation, query.as_deref().unwrap_or("")),
        Command::View {
            store,
            doc_id,
            page,
            query,
            width,
            height,
        } => view(store, &doc_id, page, query.as_deref(), (width, height)),
    }
}

fn open_fixture(path: &Path) -> Result<DocumentHandle> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let document = FixtureDecoder
        .decode(&bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    let doc_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(DocumentHandle::new(&doc_id, document)?)
}

fn search(path: &Path, query: &str) -> Result<()> {
    let handle = open_fixture(path)?;
    let mut index = DocumentIndex::new(handle, settings::current().text_cache_pages);
    let matches = index.search(query);
    if matches.is_empty() {
        println!("No matches for {:?}", query.trim());
        return Ok(());
    }
    for m in &matches {
        println!(
            "{:>4}  p.{:<4} ({} on page)  {}",
            m.global_ordinal, m.page, m.page_match_count, m.snippet
        );
    }
    Ok(())
}

fn overlay(path: &Path, page: usize, zoom: f32, rotation: i32, query: &str) -> Result<()> {
    let handle = open_fixture(path)?;
    let Some(size) = handle.page_size(page) else {
        bail!("page {page} is outside 1..={}", handle.page_count());
    };
    let rotation = Rotation::from_degrees(rotation)?;
    let viewport = PageViewport::new(size, zoom, rotation);

    let mut index = DocumentIndex::new(handle, 1);
    let matches = index.search(query);
    let items = index.page_items(page)?;

    let mut overlay = HighlightOverlay::new();
    overlay.render(OverlayInput {
        page,
        items: &items,
        viewport: &viewport,
        query,
        matches: &matches,
        active_ordinal: 0,
    });

    println!(
        "page {page}: {:.0}x{:.0} at {:.0}%, {} deg",
        viewport.width,
        viewport.height,
        zoom * 100.0,
        rotation.degrees()
    );
    for span in overlay.spans() {
        let b = &span.bbox;
        let width = b.width.map_or_else(|| "?".to_string(), |w| format!("{w:.1}"));
        let mark = if span.is_highlighted() { "*" } else { " " };
        println!(
            "{mark} #{:<3} left={:.1} top={:.1} width={width} height={:.1} angle={:.0}  {}",
            span.item_index, b.left, b.top, b.font_height, b.angle, span.text
        );
    }
    Ok(())
}

fn view(
    root: PathBuf,
    doc_id: &str,
    page: usize,
    query: Option<&str>,
    container: (f32, f32),
) -> Result<()> {
    let mut shell = ViewerShell::new(
        Arc::new(DirectoryStore::new(root)),
        Arc::new(FixtureDecoder),
        Arc::new(ListenerTable::new()),
        settings::current(),
    );
    shell.resize_viewport(container.0, container.1);
    shell.load(doc_id, page);

    match shell.wait_for_load(WAIT) {
        ViewerStatus::Ready { .. } => {}
        ViewerStatus::NotFound { doc_id } => bail!("document {doc_id} not found"),
        ViewerStatus::LoadFailed { error, .. } => bail!("{error}"),
        status => bail!("document did not load in time ({status:?})"),
    }

    if let Some(query) = query {
        shell.set_query(query, Instant::now());
    }
    if !shell.run_until_idle(WAIT) {
        bail!("viewer still busy after {WAIT:?}");
    }

    if let Some(state) = shell.state() {
        println!(
            "{doc_id}: page {}/{} at {}%",
            state.current_page,
            state.page_count,
            state.zoom.percent()
        );
    }
    if let Some(err) = shell.page_error(shell.state().map_or(page, |s| s.current_page)) {
        println!("render failed: {err}");
    }

    let rows = shell.results();
    if query.is_some() {
        println!("{} matches", rows.len());
    }
    for row in rows {
        println!(
            "{:>4}  p.{:<4} ({} on page)  {}",
            row.ordinal, row.page, row.total_for_page, row.snippet
        );
    }
    for failure in shell.search_failures() {
        println!("skipped: {failure}");
    }
    Ok(())
}
