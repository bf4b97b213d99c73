mod batch;
mod config;
mod error;
mod extract;
mod registry;
mod scene;
mod segment;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use batch::{BatchSummary, ExtractBackend};
use config::Config;
use error::{AppError, InputError};
use registry::CharacterRegistry;

/// Characters shown per scene in the `segment` preview.
const PREVIEW_CHARS: usize = 200;

#[derive(Parser)]
#[command(
    name = "scene_cast",
    about = "Track who appears where in a book, scene by scene"
)]
struct Cli {
    /// TOML config file (default: ./scene_cast.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a plain-text book into scene_NNN.json files
    Segment {
        /// Path to the book text
        book: PathBuf,
        #[arg(long, default_value = "scenes")]
        out_dir: PathBuf,
        /// Words per pseudo-sentence
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        block_size: Option<usize>,
        /// Pseudo-sentences compared on each side of a gap
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        block_window: Option<usize>,
    },
    /// Build a character registry from scene files
    Process {
        /// Scene file or directory of scene files
        path: PathBuf,
        #[arg(long, default_value = "characters.json")]
        output: PathBuf,
        /// Stored as book_metadata.title
        #[arg(long)]
        title: Option<String>,
    },
    /// Show what is known about a character at a position
    Query {
        /// Registry file written by `process`
        #[arg(long)]
        book: PathBuf,
        #[arg(long)]
        character: String,
        #[arg(long)]
        position: usize,
    },
    /// List characters known by a position
    List {
        #[arg(long)]
        book: PathBuf,
        #[arg(long)]
        position: usize,
    },
    /// Annotate scene files in place with extracted characters
    Extract {
        /// Scene file or directory of scene files
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Backend::Llm)]
        backend: Backend,
        /// Replace fields written by an earlier run
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Name list from a hosted model → characters_mentioned
    Llm,
    /// Person spans → characters_present
    Spans,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "scene_cast=debug" } else { "scene_cast=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Segment {
            book,
            out_dir,
            block_size,
            block_window,
        } => run_segment(&config, &book, &out_dir, block_size, block_window),
        Command::Process { path, output, title } => run_process(&config, &path, &output, title).await,
        Command::Query {
            book,
            character,
            position,
        } => run_query(&book, &character, position),
        Command::List { book, position } => run_list(&book, position),
        Command::Extract {
            path,
            backend,
            overwrite,
        } => run_extract(&config, &path, backend, overwrite).await,
    }
}

// ── segment ──────────────────────────────────────────────────────────────

fn run_segment(
    config: &Config,
    book: &Path,
    out_dir: &Path,
    block_size: Option<usize>,
    block_window: Option<usize>,
) -> Result<(), AppError> {
    if !book.exists() {
        return Err(InputError::NotFound(book.to_path_buf()).into());
    }
    let text = std::fs::read_to_string(book).map_err(|source| InputError::Io {
        path: book.to_path_buf(),
        source,
    })?;

    let block_size = block_size.unwrap_or(config.segment.block_size);
    let block_window = block_window.unwrap_or(config.segment.block_window);
    let scenes = segment::split_into_scenes(&text, block_size, block_window);
    let written = scene::write_scenes(&scenes, out_dir)?;
    tracing::info!(scenes = written.len(), dir = %out_dir.display(), block_size, block_window, "segmented");

    println!("Wrote {} scenes to {}", written.len(), out_dir.display());
    for (i, scene) in scenes.iter().take(3).enumerate() {
        let preview: String = scene.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if scene.chars().count() > PREVIEW_CHARS { "..." } else { "" };
        println!("\nScene {}:\n{preview}{ellipsis}", i + 1);
    }
    Ok(())
}

// ── process ──────────────────────────────────────────────────────────────

async fn run_process(
    config: &Config,
    path: &Path,
    output: &Path,
    title: Option<String>,
) -> Result<(), AppError> {
    let files = scene::discover_scene_files(path)?;
    let extractor = extract::build_span_extractor(config)?;
    tracing::info!(files = files.len(), backend = extractor.backend_id(), "building registry");

    let (mut registry, summary) =
        batch::process_scenes(&files, extractor, config.mentions.context_radius).await;

    if let Some(title) = title {
        registry.metadata.insert("title".to_string(), Value::String(title));
    }
    registry
        .metadata
        .insert("scene_count".to_string(), Value::from(summary.succeeded));

    if registry.characters().is_empty() {
        tracing::warn!("no characters found in any scene");
    }
    registry.save(output)?;
    print_summary(&summary);
    println!(
        "{} characters saved to {}",
        registry.characters().len(),
        output.display()
    );
    Ok(())
}

// ── query / list ─────────────────────────────────────────────────────────

fn run_query(book: &Path, name: &str, position: usize) -> Result<(), AppError> {
    let registry = CharacterRegistry::load(book)?;
    match registry.character_at_position(name, position) {
        Some(character) => {
            let json = serde_json::to_string_pretty(&character).map_err(error::RegistryError::from)?;
            println!("{json}");
        }
        None => println!("Character {name} not found"),
    }
    Ok(())
}

fn run_list(book: &Path, position: usize) -> Result<(), AppError> {
    let registry = CharacterRegistry::load(book)?;
    for name in registry.list_characters(position) {
        println!("{name}");
    }
    Ok(())
}

// ── extract ──────────────────────────────────────────────────────────────

async fn run_extract(
    config: &Config,
    path: &Path,
    backend: Backend,
    overwrite: bool,
) -> Result<(), AppError> {
    let files = scene::discover_scene_files(path)?;
    let backend = match backend {
        Backend::Llm => ExtractBackend::Names(extract::build_name_extractor(config)?),
        Backend::Spans => ExtractBackend::Spans(extract::build_span_extractor(config)?),
    };
    tracing::info!(
        files = files.len(),
        backend = backend.backend_id(),
        field = backend.target_field(),
        "extracting"
    );

    let summary = batch::extract_scenes(&files, backend, overwrite, config.mentions.context_radius).await;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Successfully processed {} out of {} files",
        summary.succeeded, summary.total
    );
    if summary.skipped > 0 || summary.failed > 0 {
        tracing::info!(skipped = summary.skipped, failed = summary.failed, "not processed");
    }
}
