//! Core data models for markwatch
//!
//! This module contains the marker entity returned by the change-observer API,
//! the request payloads sent to it, and the HTTP transport in [`client`].

pub mod client;

pub use client::{HttpTransport, Transport, TransportError};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A tracked geographic point whose status the backend observes over time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// Server-assigned identifier, immutable once created
    pub marker_id: String,
    /// Optional display label
    #[serde(default)]
    pub name: Option<String>,
    /// Current observed state
    #[serde(default)]
    pub status: MarkerStatus,
    /// Location of the marker
    pub coordinate: Coordinate,
    /// When tracking started
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_created: DateTime<Utc>,
    /// Addresses notified when the marker changes
    #[serde(default)]
    pub subscribed_emails: Vec<String>,
    /// Most recent satellite image
    #[serde(default)]
    pub current_image: Option<Image>,
    /// Previously captured images
    #[serde(default)]
    pub historical_images: Vec<Image>,
    /// Object detection reports
    #[serde(default)]
    pub detected_objects: Vec<DetectedObjects>,
}

/// Latitude/longitude pair in decimal degrees
///
/// The backend stores degrees as strings, so both JSON numbers and numeric
/// strings are accepted when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(deserialize_with = "deserialize_degrees")]
    pub latitude: f64,
    #[serde(deserialize_with = "deserialize_degrees")]
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true when both components are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Server-defined marker status
///
/// Statuses this client does not know about are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarkerStatus {
    Created,
    Active,
    Changed,
    #[default]
    Unknown,
    Other(String),
}

impl MarkerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MarkerStatus::Created => "created",
            MarkerStatus::Active => "active",
            MarkerStatus::Changed => "changed",
            MarkerStatus::Unknown => "unknown",
            MarkerStatus::Other(s) => s,
        }
    }
}

impl From<String> for MarkerStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "created" => MarkerStatus::Created,
            "active" => MarkerStatus::Active,
            "changed" => MarkerStatus::Changed,
            "unknown" | "" => MarkerStatus::Unknown,
            _ => MarkerStatus::Other(s),
        }
    }
}

impl From<MarkerStatus> for String {
    fn from(status: MarkerStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for MarkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored satellite image of the marker's surroundings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "dateTaken", default)]
    pub date_taken: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
    #[serde(default)]
    pub s3_key: String,
    #[serde(default)]
    pub s3_bucket_name: String,
}

/// Objects detected in an image on a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObjects {
    #[serde(default)]
    pub date_detected: String,
    #[serde(default)]
    pub detected_objects: Vec<String>,
}

/// One entry of a marker's change history
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    /// A satellite image was captured
    ImageCaptured { date: String, url: String },
    /// Objects were detected
    ObjectsDetected { date: String, objects: Vec<String> },
}

impl HistoryEvent {
    /// Raw date string as reported by the backend
    pub fn date(&self) -> &str {
        match self {
            HistoryEvent::ImageCaptured { date, .. } => date,
            HistoryEvent::ObjectsDetected { date, .. } => date,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.date())
    }
}

impl Marker {
    /// Display label, falling back the same way the detail page does
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Untitled Location",
        }
    }

    /// Merges historical images and detection reports into a newest-first timeline
    ///
    /// Entries whose date cannot be parsed sort after all dated entries.
    pub fn history(&self) -> Vec<HistoryEvent> {
        let mut events: Vec<HistoryEvent> = self
            .historical_images
            .iter()
            .map(|image| HistoryEvent::ImageCaptured {
                date: image.date_taken.clone(),
                url: image.image_url.clone(),
            })
            .chain(
                self.detected_objects
                    .iter()
                    .map(|report| HistoryEvent::ObjectsDetected {
                        date: report.date_detected.clone(),
                        objects: report.detected_objects.clone(),
                    }),
            )
            .collect();

        events.sort_by(|a, b| match (a.timestamp(), b.timestamp()) {
            (Some(ta), Some(tb)) => tb.cmp(&ta),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.date().cmp(a.date()),
        });
        events
    }

    /// Builds the static map thumbnail URL centered on this marker
    pub fn map_thumbnail_url(&self, api_key: &str) -> String {
        format!(
            "https://maps.googleapis.com/maps/api/staticmap?center={},{}&zoom=16&scale=2&size=600x600&key={}&style=feature:poi%7Cvisibility:off",
            self.coordinate.latitude, self.coordinate.longitude, api_key
        )
    }
}

/// Payload for creating a marker: marker fields minus id and creation date
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub coordinate: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MarkerStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subscribed_emails: Vec<String>,
}

impl NewMarker {
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            name: None,
            coordinate,
            status: None,
            subscribed_emails: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Partial marker fields for an update; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MarkerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
}

impl MarkerUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none() && self.coordinate.is_none()
    }
}

/// Body returned by the delete endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeleteConfirmation {
    #[serde(default)]
    pub message: Option<String>,
}

/// Parses an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Degrees {
    Number(f64),
    Text(String),
}

fn deserialize_degrees<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Degrees::deserialize(deserializer)? {
        Degrees::Number(value) => Ok(value),
        Degrees::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid degrees: {}", text))),
    }
}

#[cfg(test)]
pub(crate) fn sample_marker(id: &str) -> Marker {
    Marker {
        marker_id: id.to_string(),
        name: None,
        status: MarkerStatus::Active,
        coordinate: Coordinate::new(49.2743, -123.1544),
        date_created: Utc::now(),
        subscribed_emails: Vec::new(),
        current_image: None,
        historical_images: Vec::new(),
        detected_objects: Vec::new(),
    }
}
