//! One-shot subcommands
//!
//! Each subcommand runs a single query or mutation through [`MarkerSync`] and
//! writes the result to the given writer, as text or as JSON. Outcome messages
//! (success and failure) are emitted by the sync layer's notifier, so errors
//! returned from here for transport failures have already been shown.

use chrono::Utc;
use std::io::{self, Write};
use thiserror::Error;

use crate::cache::CacheEntry;
use crate::cli::{self, CliError, Command};
use crate::data::{HistoryEvent, Marker, TransportError};
use crate::sync::MarkerSync;
use crate::ui::format_age;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Cli(#[from] CliError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CommandError {
    /// Whether the notifier already told the user about this failure
    pub fn is_reported(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }
}

/// Output options shared by all subcommands
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub maps_api_key: Option<String>,
}

/// Runs `command` and writes its result to `out`
pub async fn run<W: Write>(
    sync: &MarkerSync,
    command: Command,
    options: &OutputOptions,
    out: &mut W,
) -> Result<(), CommandError> {
    match command {
        Command::List => {
            let entry = sync.markers().await;
            let markers = into_result(entry)?.markers().unwrap_or_default().to_vec();
            if options.json {
                write_json(out, &markers)?;
            } else {
                write_list(out, &markers)?;
            }
        }
        Command::Show { marker_id } => {
            let marker_id = cli::parse_marker_id(&marker_id)?;
            let entry = into_result(sync.marker(&marker_id).await)?;
            if let Some(marker) = entry.marker() {
                if options.json {
                    write_json(out, marker)?;
                } else {
                    write_detail(out, marker, options.maps_api_key.as_deref())?;
                }
            }
        }
        Command::Add { lat, lon, name } => {
            let payload = cli::new_marker(lat, lon, name.as_deref())?;
            let created = sync.mutations().add_marker(payload).await?;
            write_echoed(out, created.as_ref(), options.json)?;
        }
        Command::Edit {
            marker_id,
            name,
            status,
            lat,
            lon,
        } => {
            let marker_id = cli::parse_marker_id(&marker_id)?;
            let update = cli::marker_update(name.as_deref(), status.as_deref(), lat, lon)?;
            let updated = sync.mutations().edit_marker(&marker_id, update).await?;
            write_echoed(out, updated.as_ref(), options.json)?;
        }
        Command::Delete { marker_id } => {
            let marker_id = cli::parse_marker_id(&marker_id)?;
            let confirmation = sync.mutations().delete_marker(&marker_id).await?;
            if options.json {
                write_json(
                    out,
                    &serde_json::json!({
                        "markerId": marker_id,
                        "message": confirmation.message,
                    }),
                )?;
            }
        }
    }
    Ok(())
}

fn into_result(entry: CacheEntry) -> Result<CacheEntry, TransportError> {
    match entry.error.clone() {
        Some(err) if entry.is_error() => Err(err),
        _ => Ok(entry),
    }
}

fn write_json<W: Write, T: serde::Serialize + ?Sized>(
    out: &mut W,
    value: &T,
) -> Result<(), CommandError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes one row per marker: `{id} • {status}`, followed by the name when set
pub fn write_list<W: Write>(out: &mut W, markers: &[Marker]) -> io::Result<()> {
    if markers.is_empty() {
        return writeln!(out, "No markers");
    }
    for marker in markers {
        match marker.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => writeln!(out, "{} • {}  {}", marker.marker_id, marker.status, name)?,
            None => writeln!(out, "{} • {}", marker.marker_id, marker.status)?,
        }
    }
    Ok(())
}

/// Writes the detail view of one marker as plain text
pub fn write_detail<W: Write>(
    out: &mut W,
    marker: &Marker,
    maps_api_key: Option<&str>,
) -> io::Result<()> {
    writeln!(out, "{}", marker.display_name())?;
    writeln!(out, "  id:         {}", marker.marker_id)?;
    writeln!(out, "  status:     {}", marker.status)?;
    writeln!(out, "  coordinate: {}", marker.coordinate)?;
    writeln!(
        out,
        "  tracking created {}",
        format_age(marker.date_created, Utc::now())
    )?;
    if let Some(key) = maps_api_key {
        writeln!(out, "  map:        {}", marker.map_thumbnail_url(key))?;
    }
    if !marker.subscribed_emails.is_empty() {
        writeln!(out, "  notifying:  {}", marker.subscribed_emails.join(", "))?;
    }

    let history = marker.history();
    if !history.is_empty() {
        writeln!(out, "  history:")?;
        for event in &history {
            match event {
                HistoryEvent::ImageCaptured { date, url } => {
                    writeln!(out, "    {}  image captured  {}", date, url)?
                }
                HistoryEvent::ObjectsDetected { date, objects } => {
                    writeln!(out, "    {}  detected {}", date, objects.join(", "))?
                }
            }
        }
    }
    Ok(())
}

fn write_echoed<W: Write>(
    out: &mut W,
    marker: Option<&Marker>,
    json: bool,
) -> Result<(), CommandError> {
    match (marker, json) {
        (Some(marker), true) => write_json(out, marker),
        (Some(marker), false) => {
            writeln!(out, "{} • {}", marker.marker_id, marker.status)?;
            Ok(())
        }
        (None, true) => write_json(out, &serde_json::Value::Null),
        (None, false) => Ok(()),
    }
}
