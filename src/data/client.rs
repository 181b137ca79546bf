//! Change-observer marker API client
//!
//! The [`Transport`] trait is the seam between the sync layer and the network.
//! [`HttpTransport`] implements it over reqwest against the REST endpoints:
//!
//! | Operation | Request |
//! |---|---|
//! | list markers | `GET /markers` |
//! | get marker | `GET /marker?markerId={id}` |
//! | create marker | `POST /marker` |
//! | update marker | `PUT /markers/{id}` |
//! | delete marker | `DELETE /marker/{id}` |

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{DeleteConfirmation, Marker, MarkerUpdate, NewMarker};
use crate::config::Config;

/// Errors that can occur when talking to the marker API
///
/// `Clone` so one failed request can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The API could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a non-2xx status
    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    /// The requested marker does not exist
    #[error("Marker not found: {marker_id}")]
    NotFound {
        marker_id: String,
        message: Option<String>,
    },

    /// The response body did not have the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A request URL could not be built from the API root
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Message to show the user: the server's own message when it sent one,
    /// otherwise the per-operation fallback
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            TransportError::Server {
                message: Some(message),
                ..
            }
            | TransportError::NotFound {
                message: Some(message),
                ..
            } => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

/// Remote marker API
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches every marker, in server order
    async fn list_markers(&self) -> Result<Vec<Marker>, TransportError>;

    /// Fetches one marker by id
    async fn get_marker(&self, marker_id: &str) -> Result<Marker, TransportError>;

    /// Creates a marker; returns it when the server echoes the created record
    async fn create_marker(&self, marker: &NewMarker) -> Result<Option<Marker>, TransportError>;

    /// Applies a partial update; returns the marker when the server echoes it
    async fn update_marker(
        &self,
        marker_id: &str,
        update: &MarkerUpdate,
    ) -> Result<Option<Marker>, TransportError>;

    /// Deletes a marker
    async fn delete_marker(&self, marker_id: &str) -> Result<DeleteConfirmation, TransportError>;
}

/// The list endpoint answers either with a bare array or wrapped in `markers`
#[derive(Deserialize)]
#[serde(untagged)]
enum MarkerList {
    Bare(Vec<Marker>),
    Wrapped { markers: Vec<Marker> },
}

impl From<MarkerList> for Vec<Marker> {
    fn from(list: MarkerList) -> Self {
        match list {
            MarkerList::Bare(markers) | MarkerList::Wrapped { markers } => markers,
        }
    }
}

/// Client for the change-observer marker API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client for making requests
    client: Client,
    /// API root without trailing slash
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the given API root with a default client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a transport with a custom HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Builds a transport from resolved configuration
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_url.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/{collection}/{marker_id}` with the id escaped as one path
    /// segment, so ids containing `/` or `?` cannot change the route
    fn marker_url(&self, collection: &str, marker_id: &str) -> Result<Url, TransportError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(collection)
            .push(marker_id);
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_markers(&self) -> Result<Vec<Marker>, TransportError> {
        debug!(url = %self.url("/markers"), "GET markers");
        let response = self.client.get(self.url("/markers")).send().await?;
        let list: MarkerList = read_json(response).await?;
        Ok(list.into())
    }

    async fn get_marker(&self, marker_id: &str) -> Result<Marker, TransportError> {
        debug!(marker_id, "GET marker");
        let response = self
            .client
            .get(self.url("/marker"))
            .query(&[("markerId", marker_id)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::NotFound {
                marker_id: marker_id.to_string(),
                message: error_message(&body),
            });
        }

        let marker: Option<Marker> = read_json(response).await?;
        marker.ok_or_else(|| TransportError::NotFound {
            marker_id: marker_id.to_string(),
            message: None,
        })
    }

    async fn create_marker(&self, marker: &NewMarker) -> Result<Option<Marker>, TransportError> {
        debug!(coordinate = %marker.coordinate, "POST marker");
        let response = self
            .client
            .post(self.url("/marker"))
            .json(marker)
            .send()
            .await?;
        read_echoed_marker(response).await
    }

    async fn update_marker(
        &self,
        marker_id: &str,
        update: &MarkerUpdate,
    ) -> Result<Option<Marker>, TransportError> {
        let url = self.marker_url("markers", marker_id)?;
        debug!(%url, "PUT marker");
        let response = self
            .client
            .put(url)
            .json(update)
            .send()
            .await?;
        read_echoed_marker(response).await
    }

    async fn delete_marker(&self, marker_id: &str) -> Result<DeleteConfirmation, TransportError> {
        let url = self.marker_url("marker", marker_id)?;
        debug!(%url, "DELETE marker");
        let response = self
            .client
            .delete(url)
            .send()
            .await?;
        let text = read_body(response).await?;
        if text.trim().is_empty() {
            return Ok(DeleteConfirmation::default());
        }
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}

/// Returns the body text of a 2xx response, or the structured error otherwise
async fn read_body(response: Response) -> Result<String, TransportError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(TransportError::Server {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    Ok(text)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let text = read_body(response).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Mutation endpoints may answer with the marker or only a confirmation message
async fn read_echoed_marker(response: Response) -> Result<Option<Marker>, TransportError> {
    let text = read_body(response).await?;
    Ok(serde_json::from_str::<Marker>(&text).ok())
}

/// Extracts a user-facing message from an error body
///
/// `message` is preferred; the backend's lambdas report failures under `error`.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(field)?.as_str())
        .map(str::to_string)
}
