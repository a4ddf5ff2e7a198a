use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use librarian::{
    ContentExtractor, ExtractionSession, Librarian, LibrarianConfig, OutputTarget,
    duplicate_identifiers, parse_separator, read_publisher_table,
};
use llm_client::{Config, ModelPreset, ProviderKind};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "librarian",
    about = "Extract structured book metadata from EPUB files",
    long_about = "Merges publisher records, EPUB metadata and LLM-derived content attributes into one JSON record per book"
)]
#[command(version, args_conflicts_with_subcommands = true)]
struct Args {
    /// EPUB files to process
    books: Vec<PathBuf>,

    /// Also process every epub file in this directory
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Search --dir recursively
    #[arg(short, long)]
    recursive: bool,

    /// Publisher metadata table: header row, then id, title, author, year
    #[arg(long, value_name = "PATH")]
    metadata: Option<PathBuf>,

    /// Publisher table separator (tab, comma, or a single character)
    #[arg(short, long)]
    separator: Option<String>,

    /// Model preset to use (overrides default from config)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[arg(long)]
    top_p: Option<f32>,

    /// Upper bound on generated tokens per request
    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Attempts per book, including the first (1 disables retries)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Write one <id>.json per book here instead of printing to stdout
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Configuration subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Set the default model preset
    SetDefault {
        /// Name of the preset to use as default
        preset: String,
    },
    /// List available presets
    List,
    /// Show current configuration
    Show,
    /// Add a new preset
    AddPreset {
        /// Preset name
        name: String,
        /// Provider (gemini, anthropic, openai, openrouter)
        #[arg(short, long)]
        provider: String,
        /// Model identifier
        #[arg(short = 'M', long)]
        model: String,
    },
}

/// Handle config subcommands
fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::SetDefault { preset } => {
            let mut config = Config::load()?;
            config.get_preset(preset)?;
            config.default_preset = preset.clone();
            config.save()?;
            println!("Default preset set to: {}", preset);
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let mut names: Vec<_> = config.presets.keys().collect();
            names.sort();
            println!("Available presets:");
            for name in names {
                let preset = &config.presets[name];
                let default_marker = if *name == config.default_preset {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "  {} - {} / {}{}",
                    name, preset.provider, preset.model, default_marker
                );
            }
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("LLM config file: {}", Config::config_path()?.display());
            println!();
            println!("{:#?}", config);
            println!();

            let librarian_config = LibrarianConfig::load()?;
            println!(
                "Librarian config file: {}",
                LibrarianConfig::config_path()?.display()
            );
            println!();
            println!("{:#?}", librarian_config);
        }
        ConfigAction::AddPreset {
            name,
            provider,
            model,
        } => {
            ProviderKind::parse(provider)?;
            let mut config = Config::load()?;
            config.presets.insert(
                name.clone(),
                ModelPreset {
                    provider: provider.clone(),
                    model: model.clone(),
                },
            );
            config.save()?;
            println!("Added preset: {}", name);
        }
    }
    Ok(())
}

/// Find all epub files in the given directory
fn find_epub_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let max_depth = if recursive { usize::MAX } else { 1 };

    for entry in WalkDir::new(dir).follow_links(true).max_depth(max_depth) {
        let entry = entry.context("Failed to read directory entry")?;
        if entry.file_type().is_file() && is_epub(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Check if a path is an epub file (case-insensitive)
fn is_epub(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("epub"))
        .unwrap_or(false)
}

/// Apply command-line overrides on top of the config file
fn apply_overrides(config: &mut LibrarianConfig, args: &Args) {
    if let Some(separator) = &args.separator {
        config.separator = separator.clone();
    }
    if let Some(model) = &args.model {
        config.preset = Some(model.clone());
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(top_p) = args.top_p {
        config.top_p = top_p;
    }
    if let Some(max_output_tokens) = args.max_output_tokens {
        config.max_output_tokens = max_output_tokens;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Handle config subcommands first (before LLM initialization)
    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let metadata_path = args
        .metadata
        .clone()
        .context("--metadata <PATH> is required")?;

    let mut config = LibrarianConfig::load().context("Failed to load librarian config")?;
    apply_overrides(&mut config, &args);

    let mut books = args.books.clone();
    if let Some(dir) = &args.dir {
        books.extend(find_epub_files(dir, args.recursive)?);
    }
    if books.is_empty() {
        anyhow::bail!("No epub files given");
    }

    let duplicates = duplicate_identifiers(&books);
    for (id, paths) in &duplicates {
        let paths: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
        log::warn!("Identifier {} is shared by: {}", id, paths.join(", "));
    }
    if args.output_dir.is_some() && !duplicates.is_empty() {
        anyhow::bail!(
            "{} identifier(s) would overwrite each other in the output directory",
            duplicates.len()
        );
    }

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let separator = parse_separator(&config.separator)?;
    let publisher = read_publisher_table(&metadata_path, separator).with_context(|| {
        format!(
            "Failed to read publisher table {}",
            metadata_path.display()
        )
    })?;
    log::info!(
        "Loaded {} publisher record(s) from {}",
        publisher.len(),
        metadata_path.display()
    );

    let llm_config = Config::load().context("Failed to load LLM config")?;
    let session = ExtractionSession::open(&llm_config, config.preset.as_deref())?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });

    log::info!("Processing {} epub file(s)", books.len());

    let target = OutputTarget::new(args.output_dir.clone());
    let outcomes = {
        let extractor = ContentExtractor::new(&session, config.extraction_settings());
        let librarian = Librarian::new(extractor, publisher).with_cancellation(cancel);
        librarian
            .process_books_with(&books, |book| target.write(book))
            .await
    };

    let mut error_count = 0;
    for outcome in &outcomes {
        if let Err(e) = &outcome.result {
            eprintln!("Error processing \"{}\": {}", outcome.path.display(), e);
            error_count += 1;
        }
    }

    session.close();

    eprintln!("---");
    eprintln!(
        "Processed: {}, Errors: {}",
        outcomes.len() - error_count,
        error_count
    );

    if error_count > 0 {
        anyhow::bail!("{} of {} book(s) failed", error_count, outcomes.len());
    }

    Ok(())
}
