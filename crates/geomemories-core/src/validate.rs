//! Write-time validation for memory entries and media paths.
//!
//! Both checks are pure and synchronous. The storage service runs them
//! before any store call, so a rejected write never touches storage.

use crate::error::StorageError;
use crate::models::Coordinate;

/// Check a memory entry's title and coordinate.
///
/// Fails with [`StorageError::InvalidInput`] when the title is empty or
/// whitespace-only, or when either coordinate component is outside its
/// range. NaN is outside every range.
pub fn validate_entry(title: &str, coordinate: &Coordinate) -> Result<(), StorageError> {
    if title.trim().is_empty() {
        return Err(StorageError::invalid("Title cannot be empty"));
    }
    validate_coordinate(coordinate)
}

/// Check that both coordinate components are within range.
pub fn validate_coordinate(coordinate: &Coordinate) -> Result<(), StorageError> {
    if !(-90.0..=90.0).contains(&coordinate.latitude) {
        return Err(StorageError::invalid(
            "Latitude must be between -90 and 90 degrees",
        ));
    }

    if !(-180.0..=180.0).contains(&coordinate.longitude) {
        return Err(StorageError::invalid(
            "Longitude must be between -180 and 180 degrees",
        ));
    }

    Ok(())
}

/// Check that a media path is a bare file name.
///
/// Stored paths are always relative to the media directory, so separators,
/// URL schemes and dot segments are rejected.
pub fn validate_media_path(path: &str) -> Result<(), StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::invalid("Media path cannot be empty"));
    }
    if path.contains('/') || path.contains('\\') || path.contains(':') {
        return Err(StorageError::invalid(format!(
            "Media path must be a bare file name, got '{}'",
            path
        )));
    }
    if path == "." || path == ".." {
        return Err(StorageError::invalid("Media path cannot be a dot segment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    #[test]
    fn test_accepts_valid_entry() {
        assert!(validate_entry("Home", &at(52.52, 13.405)).is_ok());
        assert!(validate_entry("Pole", &at(90.0, 180.0)).is_ok());
        assert!(validate_entry("Other pole", &at(-90.0, -180.0)).is_ok());
    }

    #[test]
    fn test_rejects_blank_titles() {
        for title in ["", " ", "\t\n", "   \r\n  "] {
            let err = validate_entry(title, &at(0.0, 0.0)).unwrap_err();
            assert!(matches!(err, StorageError::InvalidInput(_)), "{:?}", title);
        }
    }

    #[test]
    fn test_rejects_out_of_range_latitude() {
        for lat in [90.0001, -90.5, 1000.0, f64::NAN, f64::INFINITY] {
            let err = validate_entry("x", &at(lat, 0.0)).unwrap_err();
            assert!(err.to_string().contains("Latitude"), "{}", lat);
        }
    }

    #[test]
    fn test_rejects_out_of_range_longitude() {
        for lon in [180.0001, -181.0, f64::NAN, f64::NEG_INFINITY] {
            let err = validate_entry("x", &at(0.0, lon)).unwrap_err();
            assert!(err.to_string().contains("Longitude"), "{}", lon);
        }
    }

    #[test]
    fn test_media_path_must_be_bare() {
        assert!(validate_media_path("3f1c.jpg").is_ok());
        assert!(validate_media_path("/var/mobile/3f1c.jpg").is_err());
        assert!(validate_media_path("file:///tmp/a.jpg").is_err());
        assert!(validate_media_path("dir\\a.jpg").is_err());
        assert!(validate_media_path("..").is_err());
        assert!(validate_media_path("  ").is_err());
    }
}
