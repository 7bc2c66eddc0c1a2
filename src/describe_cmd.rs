//! `geomem describe`: print a Wikipedia intro for a coordinate.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use geomemories_core::validate::validate_coordinate;
use geomemories_core::Coordinate;

use crate::app;
use crate::config::Config;

pub async fn run_describe(
    config: &Config,
    coordinate: Coordinate,
    token: &CancellationToken,
) -> Result<()> {
    validate_coordinate(&coordinate)?;

    let service = app::wikipedia_service(config)?;
    match service.describe_location(coordinate, token).await {
        Some(text) => println!("{}", text),
        None => eprintln!("No description found for {}", coordinate),
    }
    Ok(())
}
