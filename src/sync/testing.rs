//! Scripted in-memory transport for sync-layer tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::data::{
    DeleteConfirmation, Marker, MarkerStatus, MarkerUpdate, NewMarker, Transport, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// Behaves like the marker API over a `Vec<Marker>`
///
/// Every request is recorded as `"METHOD /path"`. Reads snapshot the data
/// before waiting on the optional gate, so a held read returns what the
/// server had when the request started. Unknown ids fail the way the
/// backend does, with a 500 and an `error` message.
#[derive(Default)]
pub struct FakeTransport {
    markers: Mutex<Vec<Marker>>,
    calls: Mutex<Vec<(Op, String)>>,
    failures: Mutex<HashMap<Op, VecDeque<TransportError>>>,
    panics: Mutex<HashSet<Op>>,
    read_gate: Mutex<Option<Arc<Semaphore>>>,
    next_id: AtomicU64,
}

impl FakeTransport {
    pub fn with_markers(markers: Vec<Marker>) -> Self {
        Self {
            markers: Mutex::new(markers),
            ..Default::default()
        }
    }

    /// Makes every later read wait for a permit on the returned semaphore
    pub fn hold_reads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.read_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Queues an error for the next request of kind `op`
    pub fn fail_next(&self, op: Op, err: TransportError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Makes the next request of kind `op` panic inside the transport
    pub fn panic_next(&self, op: Op) {
        self.panics.lock().unwrap().insert(op);
    }

    pub fn insert(&self, marker: Marker) {
        self.markers.lock().unwrap().push(marker);
    }

    pub fn remove(&self, marker_id: &str) {
        self.markers
            .lock()
            .unwrap()
            .retain(|m| m.marker_id != marker_id);
    }

    pub fn marker(&self, marker_id: &str) -> Option<Marker> {
        self.markers
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.marker_id == marker_id)
            .cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(recorded, _)| *recorded == op)
            .count()
    }

    fn record(&self, op: Op, call: String) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push((op, call));
        let panics = self.panics.lock().unwrap().remove(&op);
        if panics {
            panic!("scripted transport panic for {:?}", op);
        }
        match self
            .failures
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn wait_for_gate(&self) {
        let gate = self.read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

fn server_error(message: &str) -> TransportError {
    TransportError::Server {
        status: 500,
        message: Some(message.to_string()),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn list_markers(&self) -> Result<Vec<Marker>, TransportError> {
        let outcome = self
            .record(Op::List, "GET /markers".to_string())
            .map(|()| self.markers.lock().unwrap().clone());
        self.wait_for_gate().await;
        outcome
    }

    async fn get_marker(&self, marker_id: &str) -> Result<Marker, TransportError> {
        let outcome = self
            .record(Op::Get, format!("GET /marker?markerId={}", marker_id))
            .and_then(|()| {
                self.marker(marker_id)
                    .ok_or_else(|| server_error("Failed to retrieve marker."))
            });
        self.wait_for_gate().await;
        outcome
    }

    async fn create_marker(&self, marker: &NewMarker) -> Result<Option<Marker>, TransportError> {
        self.record(Op::Create, "POST /marker".to_string())?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = Marker {
            marker_id: format!("new-{}", id),
            name: marker.name.clone(),
            status: marker.status.clone().unwrap_or(MarkerStatus::Created),
            coordinate: marker.coordinate,
            date_created: Utc::now(),
            subscribed_emails: marker.subscribed_emails.clone(),
            current_image: None,
            historical_images: Vec::new(),
            detected_objects: Vec::new(),
        };
        self.insert(created.clone());
        Ok(Some(created))
    }

    async fn update_marker(
        &self,
        marker_id: &str,
        update: &MarkerUpdate,
    ) -> Result<Option<Marker>, TransportError> {
        self.record(Op::Update, format!("PUT /markers/{}", marker_id))?;
        let mut markers = self.markers.lock().unwrap();
        let marker = markers
            .iter_mut()
            .find(|m| m.marker_id == marker_id)
            .ok_or_else(|| server_error("Failed to update marker."))?;
        if let Some(name) = &update.name {
            marker.name = Some(name.clone());
        }
        if let Some(status) = &update.status {
            marker.status = status.clone();
        }
        if let Some(coordinate) = update.coordinate {
            marker.coordinate = coordinate;
        }
        Ok(Some(marker.clone()))
    }

    async fn delete_marker(&self, marker_id: &str) -> Result<DeleteConfirmation, TransportError> {
        self.record(Op::Delete, format!("DELETE /marker/{}", marker_id))?;
        self.remove(marker_id);
        Ok(DeleteConfirmation {
            message: Some("Marker deleted successfully".to_string()),
        })
    }
}
