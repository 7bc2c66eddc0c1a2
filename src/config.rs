//! TOML configuration parsing and validation.
//!
//! GeoMemories reads a single TOML file (default `./config/geomem.toml`).
//! Only `[db]` is required; every other section falls back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/geomem.sqlite"
//!
//! [media]
//! dir = "./data/media"
//! jpeg_quality = 95
//! thumbnail_cache_capacity = 256
//! ffmpeg_path = "ffmpeg"
//!
//! [wikipedia]
//! api_url = "https://en.wikipedia.org/w/api.php"
//!
//! [geocoder]
//! provider = "nominatim"
//! user_agent = "geomemories/0.1"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_media_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_cache_capacity")]
    pub thumbnail_cache_capacity: usize,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            jpeg_quality: default_jpeg_quality(),
            thumbnail_cache_capacity: default_cache_capacity(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("./data/media")
}
fn default_jpeg_quality() -> u8 {
    95
}
fn default_cache_capacity() -> usize {
    256
}
fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikipediaConfig {
    #[serde(default = "default_wikipedia_url")]
    pub api_url: String,
    /// No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url: default_wikipedia_url(),
            timeout_secs: None,
        }
    }
}

fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_provider")]
    pub provider: String,
    #[serde(default = "default_geocoder_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geocoder_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: default_geocoder_provider(),
            url: default_geocoder_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocoder_timeout(),
        }
    }
}

fn default_geocoder_provider() -> String {
    "nominatim".to_string()
}
fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}
fn default_user_agent() -> String {
    concat!("geomemories/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_geocoder_timeout() -> u64 {
    30
}

impl GeocoderConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/geomem.sqlite"),
            },
            media: MediaConfig::default(),
            wikipedia: WikipediaConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    // Validate media
    if !(90..=95).contains(&config.media.jpeg_quality) {
        anyhow::bail!("media.jpeg_quality must be in [90, 95]");
    }
    if config.media.thumbnail_cache_capacity == 0 {
        anyhow::bail!("media.thumbnail_cache_capacity must be > 0");
    }

    // Validate wikipedia
    if config.wikipedia.api_url.trim().is_empty() {
        anyhow::bail!("wikipedia.api_url must not be empty");
    }
    if config.wikipedia.timeout_secs == Some(0) {
        anyhow::bail!("wikipedia.timeout_secs must be > 0 when set");
    }

    // Validate geocoder
    match config.geocoder.provider.as_str() {
        "disabled" | "nominatim" => {}
        other => anyhow::bail!(
            "Unknown geocoder provider: '{}'. Must be disabled or nominatim.",
            other
        ),
    }
    if config.geocoder.is_enabled() && config.geocoder.user_agent.trim().is_empty() {
        anyhow::bail!("geocoder.user_agent must be set when provider is 'nominatim'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config = parse("[db]\npath = \"/tmp/g.sqlite\"\n").unwrap();
        assert_eq!(config.media.jpeg_quality, 95);
        assert_eq!(config.media.thumbnail_cache_capacity, 256);
        assert_eq!(config.wikipedia.api_url, "https://en.wikipedia.org/w/api.php");
        assert!(config.wikipedia.timeout_secs.is_none());
        assert!(config.geocoder.is_enabled());
    }

    #[test]
    fn test_rejects_quality_out_of_range() {
        let err = parse("[db]\npath = \"x\"\n[media]\njpeg_quality = 80\n").unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_rejects_unknown_geocoder() {
        let err = parse("[db]\npath = \"x\"\n[geocoder]\nprovider = \"google\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown geocoder provider"));
    }

    #[test]
    fn test_example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/geomem.example.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.geocoder.provider, "nominatim");
        assert_eq!(config.geocoder.timeout_secs, 30);
    }

    #[test]
    fn test_missing_db_section_fails() {
        assert!(parse("[media]\ndir = \"m\"\n").is_err());
    }
}
