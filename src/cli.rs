//! Command-line interface parsing for markwatch
//!
//! This module handles parsing of CLI arguments using clap. Running without a
//! subcommand opens the terminal UI; each subcommand performs a single marker
//! operation and exits.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::data::{Coordinate, MarkerStatus, MarkerUpdate, NewMarker};

/// Error types for CLI argument validation
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// Latitude or longitude outside WGS84 bounds
    #[error("Invalid coordinate: {lat}, {lon}. Latitude must be within ±90 and longitude within ±180")]
    InvalidCoordinate { lat: f64, lon: f64 },
    /// Only one of latitude/longitude was given
    #[error("Both --lat and --lon are required to move a marker")]
    IncompleteCoordinate,
    /// Marker id was blank
    #[error("Marker id must not be empty")]
    EmptyMarkerId,
    /// `edit` without any field to change
    #[error("Nothing to edit: pass at least one of --name, --status, --lat/--lon")]
    EmptyEdit,
}

/// markwatch - Track geographic markers and watch them change
#[derive(Parser, Debug)]
#[command(name = "markwatch")]
#[command(about = "Track geographic markers and watch them change")]
#[command(version)]
pub struct Cli {
    /// Base URL of the marker API (overrides config file and environment)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Path to a config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print subcommand results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One-shot marker operations
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List all markers
    List,
    /// Show one marker in detail
    Show {
        /// Marker id
        marker_id: String,
    },
    /// Start tracking a new location
    ///
    /// Example:
    ///   markwatch add --lat 49.2743 --lon -123.1544 --name "Kits Beach"
    #[command(allow_negative_numbers = true)]
    Add {
        /// Latitude in decimal degrees
        #[arg(long)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long)]
        lon: f64,
        /// Optional display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Change a marker's name, status or location
    #[command(allow_negative_numbers = true)]
    Edit {
        /// Marker id
        marker_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lon: Option<f64>,
    },
    /// Stop tracking a marker
    Delete {
        /// Marker id
        marker_id: String,
    },
}

/// Validates a latitude/longitude pair into a [`Coordinate`].
///
/// # Arguments
/// * `lat` - Latitude in decimal degrees
/// * `lon` - Longitude in decimal degrees
///
/// # Returns
/// * `Ok(Coordinate)` if both values are in range
/// * `Err(CliError::InvalidCoordinate)` otherwise
pub fn parse_coordinate(lat: f64, lon: f64) -> Result<Coordinate, CliError> {
    let coordinate = Coordinate::new(lat, lon);
    if coordinate.is_valid() {
        Ok(coordinate)
    } else {
        Err(CliError::InvalidCoordinate { lat, lon })
    }
}

/// Rejects blank marker ids, returning the trimmed id
pub fn parse_marker_id(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CliError::EmptyMarkerId)
    } else {
        Ok(id.to_string())
    }
}

/// Builds the create payload for `add`
pub fn new_marker(lat: f64, lon: f64, name: Option<&str>) -> Result<NewMarker, CliError> {
    let marker = NewMarker::at(parse_coordinate(lat, lon)?);
    Ok(match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => marker.with_name(name),
        None => marker,
    })
}

/// Builds the partial update for `edit`.
///
/// # Returns
/// * `Err(CliError::IncompleteCoordinate)` if only one of `lat`/`lon` is set
/// * `Err(CliError::EmptyEdit)` if no field would change
pub fn marker_update(
    name: Option<&str>,
    status: Option<&str>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<MarkerUpdate, CliError> {
    let coordinate = match (lat, lon) {
        (Some(lat), Some(lon)) => Some(parse_coordinate(lat, lon)?),
        (None, None) => None,
        _ => return Err(CliError::IncompleteCoordinate),
    };
    let update = MarkerUpdate {
        name: name.map(str::to_string),
        status: status.map(|s| MarkerStatus::from(s.to_string())),
        coordinate,
    };
    if update.is_empty() {
        Err(CliError::EmptyEdit)
    } else {
        Ok(update)
    }
}
