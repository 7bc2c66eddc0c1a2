//! Database and media directory overview for `geomem stats`.

use anyhow::Result;
use sqlx::Row;
use walkdir::WalkDir;

use crate::app::App;
use crate::config::Config;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config, app: &App) -> Result<()> {
    let total_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_entries")
        .fetch_one(app.pool())
        .await?;

    let media_row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN kind = 0 THEN 1 ELSE 0 END), 0) AS images,
            COALESCE(SUM(CASE WHEN kind = 1 THEN 1 ELSE 0 END), 0) AS videos,
            COALESCE(SUM(CASE WHEN owner_id IS NULL THEN 1 ELSE 0 END), 0) AS unlinked
        FROM media_items
        "#,
    )
    .fetch_one(app.pool())
    .await?;

    let last_update: Option<i64> = sqlx::query_scalar("SELECT MAX(updated_at) FROM memory_entries")
        .fetch_one(app.pool())
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let media_size = dir_size(&config.media.dir);

    println!("GeoMemories Stats");
    println!("=================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Media dir:   {}", config.media.dir.display());
    println!("  Media size:  {}", format_bytes(media_size));
    println!();
    println!("  Entries:     {}", total_entries);
    println!(
        "  Media:       {} ({} images, {} videos, {} unlinked)",
        media_row.get::<i64, _>("total"),
        media_row.get::<i64, _>("images"),
        media_row.get::<i64, _>("videos"),
        media_row.get::<i64, _>("unlinked"),
    );
    println!(
        "  Last edit:   {}",
        last_update
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();

    Ok(())
}

fn dir_size(dir: &std::path::Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return crate::entries::format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        crate::entries::format_ts_iso(ts)
    }
}
