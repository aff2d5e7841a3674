use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use audio_carousel_core::{
    AppConfig, AudioGraphManager, AudioSession, CarouselController, ConsoleDisplay,
    ConsoleRenderer, Direction, FsContentFetcher, PageSet, SyntheticBackend, VisualRenderer,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> audio_carousel_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            pages,
            content_root,
            steps,
        } => run_demo(pages.as_deref(), &content_root, steps).await,
        Commands::Validate { manifest } => run_validate(&manifest),
    }
}

async fn run_demo(
    pages: Option<&std::path::Path>,
    content_root: &std::path::Path,
    steps: u32,
) -> audio_carousel_core::Result<()> {
    let config = AppConfig::default();
    let pages = match pages {
        Some(path) => PageSet::from_json(&std::fs::read_to_string(path)?)?,
        None => PageSet::demo(),
    };
    tracing::info!(pages = pages.len(), steps, "starting carousel demo");

    let graph = Arc::new(AudioGraphManager::new(&config.analyser));
    let backend = Arc::new(SyntheticBackend::new(
        Duration::from_millis(50),
        Duration::from_secs(2),
    ));
    let session = AudioSession::new(Arc::clone(&graph), backend);
    let renderer = Arc::new(ConsoleRenderer::new());
    let controller = CarouselController::new(
        pages,
        config.carousel.clone(),
        graph,
        session,
        Arc::new(FsContentFetcher::new(content_root)),
        Arc::new(ConsoleDisplay),
        Arc::clone(&renderer) as _,
    );

    {
        let renderer = Arc::clone(&renderer);
        controller.on_session_ended(move || {
            tracing::info!("clip finished");
            renderer.stop();
        });
    }

    controller.show_initial().await?;

    for _ in 0..steps {
        controller.navigate(Direction::Right);
        tokio::time::sleep(config.carousel.debounce() + Duration::from_millis(200)).await;
    }

    // Let the final clip play out so the ended callback is visible.
    tokio::time::sleep(Duration::from_secs(3)).await;
    Ok(())
}

fn run_validate(manifest: &PathBuf) -> audio_carousel_core::Result<()> {
    let raw = std::fs::read_to_string(manifest)?;
    let pages = PageSet::from_json(&raw)?;

    for page in pages.pages() {
        tracing::info!(
            id = %page.id,
            audio = %page.audio_url,
            content = page.content_url.as_deref().unwrap_or("-"),
            "page"
        );
    }
    tracing::info!(count = pages.len(), "page manifest is valid");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive presentation carousel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted navigation demo against a synthetic media backend.
    Demo {
        /// Optional JSON page manifest; falls back to the built-in demo set.
        #[arg(short, long)]
        pages: Option<PathBuf>,
        /// Directory that content fragment references resolve under.
        #[arg(short, long, default_value = "content")]
        content_root: PathBuf,
        /// Number of navigation steps to perform.
        #[arg(short, long, default_value_t = 3)]
        steps: u32,
    },
    /// Check a page manifest without running anything.
    Validate {
        /// Path to the JSON page manifest.
        manifest: PathBuf,
    },
}
