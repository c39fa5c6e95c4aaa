//! Application configuration for AtlasBot.
//!
//! User config lives at `~/.atlasbot/atlasbot.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "atlasbot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".atlasbot";

// ---------------------------------------------------------------------------
// Config structs (matching atlasbot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Live source pages the registry is rebuilt from on each start.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// HTTP fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Reply rendering settings.
    #[serde(default)]
    pub reply: ReplyConfig,
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Index page linking to per-country city list pages.
    #[serde(default = "default_city_index_url")]
    pub city_index_url: String,

    /// List-of-countries page with a population table.
    #[serde(default = "default_countries_url")]
    pub countries_url: String,

    /// List-of-continents page with a population table.
    #[serde(default = "default_continents_url")]
    pub continents_url: String,

    /// Columns to keep from the country table, in order. First column names the place.
    #[serde(default = "default_country_columns")]
    pub country_columns: Vec<String>,

    /// Columns to keep from the continent table, in order.
    #[serde(default = "default_continent_columns")]
    pub continent_columns: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            city_index_url: default_city_index_url(),
            countries_url: default_countries_url(),
            continents_url: default_continents_url(),
            country_columns: default_country_columns(),
            continent_columns: default_continent_columns(),
        }
    }
}

fn default_city_index_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_towns_and_cities_with_100,000_or_more_inhabitants"
        .into()
}
fn default_countries_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_countries_by_population_(United_Nations)".into()
}
fn default_continents_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_continents_and_continental_subregions_by_population"
        .into()
}
fn default_country_columns() -> Vec<String> {
    vec![
        "Location".into(),
        "Population (1 July 2023)".into(),
        "UN Continental Region".into(),
    ]
}
fn default_continent_columns() -> Vec<String> {
    vec![
        "Continent".into(),
        "Population (2021)".into(),
        "Countries (2021)".into(),
    ]
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[reply]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Hard upper bound on the length of a single text chunk.
    #[serde(default = "default_max_chunk_len")]
    pub max_chunk_len: usize,

    /// Render only the summary block instead of the full body.
    #[serde(default = "default_true")]
    pub summary: bool,

    /// Render hyperlinked markdown instead of plain text.
    #[serde(default = "default_true")]
    pub markdown: bool,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: default_max_chunk_len(),
            summary: default_true(),
            markdown: default_true(),
        }
    }
}

fn default_max_chunk_len() -> usize {
    2000
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.atlasbot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AtlasError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.atlasbot/atlasbot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AtlasError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AtlasError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AtlasError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AtlasError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AtlasError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
