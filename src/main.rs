//! # GeoMemories CLI (`geomem`)
//!
//! The `geomem` binary manages a local journal of geotagged memories: entries
//! with a title, description and coordinate, plus the photos and videos
//! attached to them.
//!
//! ## Usage
//!
//! ```bash
//! geomem --config ./config/geomem.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `geomem init` | Create the database schema and media directory |
//! | `geomem add` | Create a memory entry |
//! | `geomem list` / `show <id>` | Inspect entries |
//! | `geomem edit <id>` | Change an entry's fields or media set |
//! | `geomem delete <id>` | Delete an entry and its media |
//! | `geomem media import FILE…` | Import photos and videos |
//! | `geomem media link/delete/thumbnail/gc` | Manage imported media |
//! | `geomem describe --lat --lon` | Wikipedia intro for a location |
//! | `geomem export` / `import` | JSON dump and restore of entries |
//! | `geomem stats` | Counts and sizes |
//!
//! ## Examples
//!
//! ```bash
//! geomem init
//! geomem media import ~/Pictures/harbor.heic ~/Movies/ferry.mov
//! geomem add --title "Helsinki harbor" --lat 60.1675 --lon 24.9525 \
//!     --media 1f0e...jpg
//! geomem describe --lat 60.1675 --lon 24.9525
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use geomemories::app::App;
use geomemories::config;
use geomemories::entries::{self, EntryEdit};
use geomemories::{describe_cmd, export, logging, media_cmd, migrate, stats};
use geomemories_core::models::{Coordinate, EntryDraft};

/// GeoMemories CLI: a local journal of geotagged memories.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/geomem.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "geomem",
    about = "GeoMemories: a local journal of geotagged memories with photos and videos",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/geomem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and media directory.
    ///
    /// Idempotent: running it again is safe.
    Init,

    /// Create a memory entry and print its id.
    Add {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Path of an imported media item to link (repeatable).
        #[arg(long = "media")]
        media: Vec<String>,
    },

    /// List all entries.
    List,

    /// Show one entry with its media.
    Show { id: String },

    /// Change fields of an existing entry.
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Replace the media set with these paths (repeatable).
        #[arg(long = "media")]
        media: Vec<String>,

        /// Unlink all media from the entry.
        #[arg(long, conflicts_with = "media")]
        clear_media: bool,
    },

    /// Delete an entry together with its media files.
    Delete {
        id: String,

        /// Keep the entry's media (records and files), unlinked.
        #[arg(long)]
        keep_media: bool,
    },

    /// Manage imported photos and videos.
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },

    /// Print a Wikipedia description of a location.
    Describe {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Export all entries as JSON.
    Export {
        /// Output file path. If omitted, writes to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import entries from an export file, all or nothing.
    Import {
        file: PathBuf,

        /// Drop media references instead of linking them.
        #[arg(long)]
        without_media: bool,
    },

    /// Show entry and media counts.
    Stats,
}

#[derive(Subcommand)]
enum MediaAction {
    /// Import files into the media directory.
    ///
    /// Images are re-encoded as JPEG; videos are copied as-is.
    Import {
        /// Link the imported items to this entry.
        #[arg(long)]
        entry: Option<String>,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Link an imported item to an entry.
    Link { path: String, entry: String },

    /// Delete a media item and its file.
    Delete { path: String },

    /// Write a media item's thumbnail as PNG.
    Thumbnail {
        path: String,

        #[arg(long)]
        out: PathBuf,
    },

    /// Find files without records and records without files.
    Gc {
        /// Remove what was found.
        #[arg(long)]
        prune: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling");
                token.cancel();
            }
        });
    }

    // Describe only needs network settings, so it also runs without a config file
    if let Commands::Describe { lat, lon } = cli.command {
        let cfg = if cli.config.exists() {
            config::load_config(&cli.config)?
        } else {
            debug!(path = %cli.config.display(), "no config file, using defaults");
            config::Config::minimal()
        };
        return describe_cmd::run_describe(&cfg, Coordinate::new(lat, lon), &token).await;
    }

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        std::fs::create_dir_all(&cfg.media.dir)?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let app = App::open(&cfg).await?;
    let result = run(&cfg, &app, cli.command, &token).await;
    app.close().await;
    result
}

async fn run(
    cfg: &config::Config,
    app: &App,
    command: Commands,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Commands::Add {
            title,
            description,
            lat,
            lon,
            media,
        } => {
            let draft = EntryDraft::new(title, Coordinate::new(lat, lon))
                .with_description(description)
                .with_media(media);
            entries::run_add(app, draft).await?;
        }
        Commands::List => entries::run_list(app).await?,
        Commands::Show { id } => entries::run_show(app, entries::parse_id(&id)?).await?,
        Commands::Edit {
            id,
            title,
            description,
            lat,
            lon,
            media,
            clear_media,
        } => {
            let media = if clear_media {
                Some(Vec::new())
            } else if media.is_empty() {
                None
            } else {
                Some(media)
            };
            let edit = EntryEdit {
                title,
                description,
                latitude: lat,
                longitude: lon,
                media,
            };
            entries::run_edit(app, entries::parse_id(&id)?, edit).await?;
        }
        Commands::Delete { id, keep_media } => {
            entries::run_delete(app, entries::parse_id(&id)?, keep_media).await?;
        }
        Commands::Media { action } => match action {
            MediaAction::Import { entry, files } => {
                let entry = entry.as_deref().map(entries::parse_id).transpose()?;
                media_cmd::run_import(app, entry, &files, token).await?;
            }
            MediaAction::Link { path, entry } => {
                media_cmd::run_link(app, &path, entries::parse_id(&entry)?).await?;
            }
            MediaAction::Delete { path } => media_cmd::run_delete(app, &path).await?,
            MediaAction::Thumbnail { path, out } => {
                media_cmd::run_thumbnail(app, &path, &out, token).await?;
            }
            MediaAction::Gc { prune } => media_cmd::run_gc(app, prune).await?,
        },
        Commands::Export { output } => export::run_export(app, output.as_deref()).await?,
        Commands::Import {
            file,
            without_media,
        } => export::run_import(app, &file, without_media).await?,
        Commands::Stats => stats::run_stats(cfg, app).await?,
        Commands::Init | Commands::Describe { .. } => {
            // Handled above (before opening the database)
            unreachable!()
        }
    }
    Ok(())
}
