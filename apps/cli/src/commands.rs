//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use atlasbot_fetch::{Fetcher, HttpFetcher};
use atlasbot_registry::{
    ContentChunk, EnrichSession, EnrichmentState, LocationEntity, LocationRegistry, NameLookup,
    ReplyOptions, build_registry,
};
use atlasbot_shared::{AppConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AtlasBot — a registry of places scraped from live encyclopedia sources.
#[derive(Parser)]
#[command(
    name = "atlasbot",
    version,
    about = "Detect and describe place mentions using live encyclopedia data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the registry from the configured live sources and print stats.
    Build,

    /// Find place mentions in free-form text and describe the first match.
    Find {
        /// Text to scan for place mentions.
        text: String,

        /// Render plain text instead of markdown (skips the image).
        #[arg(long)]
        plain: bool,

        /// Render the full article body instead of the lead section.
        #[arg(long)]
        full: bool,
    },

    /// Look up a single place by name.
    Lookup {
        /// Place name to resolve.
        name: String,

        /// Render plain text instead of markdown (skips the image).
        #[arg(long)]
        plain: bool,

        /// Render the full article body instead of the lead section.
        #[arg(long)]
        full: bool,
    },

    /// Describe a uniformly random place from the registry.
    Random {
        /// Render plain text instead of markdown (skips the image).
        #[arg(long)]
        plain: bool,

        /// Render the full article body instead of the lead section.
        #[arg(long)]
        full: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "atlasbot=info",
        1 => "atlasbot=debug",
        _ => "atlasbot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build => cmd_build().await,
        Command::Find { text, plain, full } => cmd_find(&text, plain, full).await,
        Command::Lookup { name, plain, full } => cmd_lookup(&name, plain, full).await,
        Command::Random { plain, full } => cmd_random(plain, full).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Registry bootstrap
// ---------------------------------------------------------------------------

/// Build the registry from live sources, with a spinner while fetching.
async fn bootstrap(config: &AppConfig) -> Result<(Arc<dyn Fetcher>, LocationRegistry)> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.fetch.timeout_secs)?);

    let spinner = new_spinner();
    spinner.set_message("Building registry from live sources");
    let registry = build_registry(&fetcher, &config.sources).await?;
    spinner.finish_and_clear();

    Ok((fetcher, registry))
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn reply_options(config: &AppConfig, plain: bool, full: bool) -> ReplyOptions {
    ReplyOptions {
        summary: config.reply.summary && !full,
        markdown: config.reply.markdown && !plain,
        max_chunk_len: config.reply.max_chunk_len,
        continue_name: None,
    }
}

/// Print reply chunks; image payloads print as a size note.
fn print_chunks(chunks: &[ContentChunk]) {
    for chunk in chunks {
        match chunk {
            ContentChunk::Text(text) => println!("{text}"),
            ContentChunk::Image(bytes) => println!("[image: {} bytes]", bytes.len()),
        }
    }
}

async fn describe(
    entity: &LocationEntity,
    fetcher: &Arc<dyn Fetcher>,
    options: &ReplyOptions,
) -> Result<()> {
    // Lookup paths enrich to name-only; fill in whatever rendering needs.
    let target = if options.markdown {
        EnrichmentState::Full
    } else {
        EnrichmentState::NameOnly
    };
    let session = EnrichSession::new(Arc::clone(fetcher));
    entity.ensure(target, &session).await?;

    print_chunks(&entity.render_reply(options)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build() -> Result<()> {
    let config = load_config()?;
    let start = Instant::now();
    let (_fetcher, registry) = bootstrap(&config).await?;

    println!();
    println!("  Registry built from live sources");
    println!("  Keys:     {}", registry.key_count());
    println!("  Entities: {}", registry.len());
    println!("  Time:     {:.1}s", start.elapsed().as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_find(text: &str, plain: bool, full: bool) -> Result<()> {
    let config = load_config()?;
    let (fetcher, registry) = bootstrap(&config).await?;

    info!(text, "matching text against registry");
    let mentions = registry.find_mentions(text, Arc::clone(&fetcher)).await;
    let Some(first) = mentions.first() else {
        println!("No places mentioned.");
        return Ok(());
    };

    let mut options = reply_options(&config, plain, full);
    options.continue_name = mentions
        .get(1)
        .map(|e| e.display_name().unwrap_or(&e.key).to_string());

    print_chunks(&first.render_reply(&options)?);

    if mentions.len() > 1 {
        println!();
        println!("Also mentioned:");
        for entity in &mentions[1..] {
            println!("  - {}", entity.display_name().unwrap_or(&entity.key));
        }
    }
    Ok(())
}

async fn cmd_lookup(name: &str, plain: bool, full: bool) -> Result<()> {
    let config = load_config()?;
    let (fetcher, registry) = bootstrap(&config).await?;

    match registry
        .resolve_by_name(name, None, Arc::clone(&fetcher))
        .await?
    {
        NameLookup::Found(entity) => {
            let options = reply_options(&config, plain, full);
            describe(&entity, &fetcher, &options).await
        }
        NameLookup::Ambiguous(candidates) => {
            println!("\"{name}\" is ambiguous; did you mean:");
            for entity in &candidates {
                println!("  - {}", entity.display_name().unwrap_or(&entity.key));
            }
            Ok(())
        }
        NameLookup::NotFound => Err(eyre!("no place named '{name}' in the registry")),
    }
}

async fn cmd_random(plain: bool, full: bool) -> Result<()> {
    let config = load_config()?;
    let (fetcher, registry) = bootstrap(&config).await?;

    let entity = registry.random_entity(fetcher).await?;
    let options = reply_options(&config, plain, full);
    print_chunks(&entity.render_reply(&options)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
