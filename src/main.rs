use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use image::RgbaImage;
use tracing::{info, warn};

use pagescroll::config::Config;
use pagescroll::error::{AppError, AppResult};
use pagescroll::event::ViewerEvent;
use pagescroll::library::list_documents;
use pagescroll::logging;
use pagescroll::search::SearchStatus;
use pagescroll::settings::SettingsStore;
use pagescroll::viewer::Viewer;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "pagescroll", version, about = "Continuous-scroll PDF page renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render the pages around a scroll position to PNG files.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Fixed zoom factor; fit-width is used when omitted.
        #[arg(long, conflicts_with = "fit_width")]
        zoom: Option<f32>,
        #[arg(long)]
        fit_width: bool,
        #[arg(long, default_value_t = 1000)]
        width: i32,
        #[arg(long, default_value_t = 800)]
        height: i32,
        #[arg(long, default_value_t = 0)]
        scroll: i32,
        /// Highlight matches of this query and jump to the first one.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the PDF documents of a library directory.
    Library {
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = logging::init() {
        eprintln!("{err}");
    }
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    match cli.command {
        Commands::Render {
            file,
            zoom,
            fit_width,
            width,
            height,
            scroll,
            search,
            out,
            config,
        } => {
            let config = match config {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load()?,
            };
            let view = RenderView {
                zoom,
                fit_width,
                width,
                height,
                scroll,
                search,
            };
            run_render(config, &file, view, &out).await
        }
        Commands::Library { dir } => run_library(dir),
    }
}

struct RenderView {
    zoom: Option<f32>,
    fit_width: bool,
    width: i32,
    height: i32,
    scroll: i32,
    search: Option<String>,
}

async fn run_render(config: Config, file: &Path, view: RenderView, out: &Path) -> AppResult<()> {
    let mut viewer = Viewer::new(config)?;
    apply_view(&mut viewer, &view);
    viewer.open_document(file)?;
    viewer.set_scroll_offset(view.scroll);

    if let Some(query) = view.search.as_deref() {
        viewer.start_search(query);
        while viewer.search().status() == SearchStatus::Searching {
            tokio::time::sleep(Duration::from_millis(10)).await;
            viewer.pump();
        }
    }

    if !viewer.settle(SETTLE_TIMEOUT).await {
        warn!("gave up waiting for renders");
    }
    for event in viewer.drain_events() {
        match event {
            ViewerEvent::PageFound { page, query, .. } => {
                info!(page = page + 1, %query, "match found");
            }
            ViewerEvent::SearchEmpty { query } => info!(%query, "no matches"),
            _ => {}
        }
    }

    let written = write_rendered_cells(&viewer, out)?;
    let stats = viewer.stats();
    info!(
        written,
        completed = stats.completed,
        stale = stats.stale_discarded,
        failed = stats.failed,
        evicted = stats.evicted,
        last_render_ms = stats.render_ms,
        "render finished"
    );
    viewer.close_document();
    Ok(())
}

fn apply_view(viewer: &mut Viewer, view: &RenderView) {
    viewer.set_viewport_size(view.width, view.height);
    if view.fit_width {
        viewer.set_fit_width(true);
    } else if let Some(zoom) = view.zoom {
        viewer.set_fit_width(false);
        viewer.set_zoom(zoom);
    }
}

fn write_rendered_cells(viewer: &Viewer, out: &Path) -> AppResult<usize> {
    fs::create_dir_all(out).map_err(|source| {
        AppError::io_with_context(
            source,
            format!("failed to create output directory: {}", out.display()),
        )
    })?;

    let mut written = 0;
    for cell in viewer.cells() {
        let Some(bitmap) = cell.bitmap() else {
            continue;
        };
        let image = RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.pixels_to_vec())
            .ok_or_else(|| AppError::invalid_argument("bitmap size does not match its pixels"))?;
        let path = out.join(format!("page-{:04}.png", cell.index() + 1));
        image.save(&path).map_err(|err| {
            AppError::unsupported(format!("failed to write {}: {err}", path.display()))
        })?;
        written += 1;
    }
    Ok(written)
}

fn run_library(dir: Option<PathBuf>) -> AppResult<()> {
    let root = match dir {
        Some(dir) => dir,
        None => SettingsStore::open_default()?.library_path()?,
    };
    let tree = list_documents(&root)?;
    for group in &tree.groups {
        println!("{} ({})", group.display_name, group.documents.len());
        if !group.expanded {
            continue;
        }
        for document in &group.documents {
            println!("  {}", document.display_name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::{Cli, Commands, RenderView, apply_view};
    use pagescroll::config::Config;
    use pagescroll::viewer::Viewer;

    fn view(zoom: Option<f32>, fit_width: bool) -> RenderView {
        RenderView {
            zoom,
            fit_width,
            width: 800,
            height: 600,
            scroll: 0,
            search: None,
        }
    }

    #[test]
    fn render_subcommand_parses_view_options() {
        let cli = Cli::try_parse_from([
            "pagescroll",
            "render",
            "book.pdf",
            "--zoom",
            "1.5",
            "--scroll",
            "1200",
            "--search",
            "needle",
        ])
        .expect("render args should parse");

        let Commands::Render {
            file,
            zoom,
            scroll,
            search,
            width,
            ..
        } = cli.command
        else {
            panic!("expected render subcommand");
        };
        assert_eq!(file, PathBuf::from("book.pdf"));
        assert_eq!(zoom, Some(1.5));
        assert_eq!(scroll, 1200);
        assert_eq!(search.as_deref(), Some("needle"));
        assert_eq!(width, 1000);
    }

    #[test]
    fn zoom_conflicts_with_fit_width_and_file_is_required() {
        assert!(
            Cli::try_parse_from(["pagescroll", "render", "a.pdf", "--zoom", "2", "--fit-width"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["pagescroll", "render"]).is_err());
    }

    #[test]
    fn fit_width_flag_switches_the_viewer_back_to_fit_width() {
        let cli = Cli::try_parse_from(["pagescroll", "render", "a.pdf", "--fit-width"])
            .expect("render args should parse");
        let Commands::Render { fit_width, zoom, .. } = cli.command else {
            panic!("expected render subcommand");
        };
        assert!(fit_width);
        assert_eq!(zoom, None);

        let mut viewer = Viewer::new(Config::default()).expect("viewer should start");
        viewer.set_fit_width(false);
        apply_view(&mut viewer, &view(zoom, fit_width));
        assert!(viewer.state().fit_width);
        assert_eq!(viewer.state().viewport_width, 800);
    }

    #[test]
    fn zoom_option_leaves_fit_width() {
        let mut viewer = Viewer::new(Config::default()).expect("viewer should start");
        apply_view(&mut viewer, &view(Some(1.5), false));
        assert!(!viewer.state().fit_width);
        assert_eq!(viewer.state().zoom, 1.5);
    }

    #[test]
    fn library_directory_is_optional() {
        let cli = Cli::try_parse_from(["pagescroll", "library"]).expect("library should parse");
        assert!(matches!(cli.command, Commands::Library { dir: None }));
    }
}
