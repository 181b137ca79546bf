//! Application state management for markwatch
//!
//! This module contains the terminal UI state: which view is shown, the list
//! selection, the add-marker form and the toast line. Data comes from cache
//! subscriptions on a shared [`MarkerSync`]; key handlers start queries and
//! mutations on background tasks and [`App::tick`] folds their outcomes back
//! into the view state.

use crossterm::event::{KeyCode, KeyEvent};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::{CacheEntry, QueryKey, Subscription};
use crate::cli;
use crate::data::{Marker, NewMarker};
use crate::notify::Notification;
use crate::sync::{MarkerSync, MutationKind, MutationState};

/// How long a notification stays on the toast line
pub const TOAST_DURATION: Duration = Duration::from_secs(4);

/// A shortcut as listed in the help overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHint {
    pub codes: &'static [KeyCode],
    pub action: &'static str,
}

const fn hint(codes: &'static [KeyCode], action: &'static str) -> KeyHint {
    KeyHint { codes, action }
}

/// Shortcuts understood by [`App::handle_key`], grouped by view
///
/// Keep in step with the match arms there; the help overlay is built from it.
pub const KEY_MAP: &[(&str, &[KeyHint])] = &[
    (
        "Marker list",
        &[
            hint(&[KeyCode::Up, KeyCode::Char('k')], "Select previous"),
            hint(&[KeyCode::Down, KeyCode::Char('j')], "Select next"),
            hint(&[KeyCode::Enter], "Open marker details"),
            hint(&[KeyCode::Char('a')], "Track a new location"),
            hint(&[KeyCode::Char('d')], "Delete selected marker"),
            hint(&[KeyCode::Char('r')], "Refresh markers"),
            hint(&[KeyCode::Char('q'), KeyCode::Esc], "Quit"),
        ],
    ),
    (
        "Marker detail",
        &[
            hint(&[KeyCode::Up, KeyCode::Char('k')], "Scroll up"),
            hint(&[KeyCode::Down, KeyCode::Char('j')], "Scroll down"),
            hint(&[KeyCode::Char('d')], "Delete this marker"),
            hint(&[KeyCode::Char('r')], "Refresh marker"),
            hint(&[KeyCode::Esc], "Back to list"),
            hint(&[KeyCode::Char('q')], "Quit"),
        ],
    ),
    (
        "Add form",
        &[
            hint(&[KeyCode::Tab, KeyCode::Down], "Next field"),
            hint(&[KeyCode::BackTab, KeyCode::Up], "Previous field"),
            hint(&[KeyCode::Enter], "Add marker"),
            hint(&[KeyCode::Esc], "Cancel"),
        ],
    ),
    ("Help", &[hint(&[KeyCode::Char('?')], "Toggle this help")]),
];

/// Short label for a key, e.g. `↑` or `S-Tab`
pub fn key_label(code: &KeyCode) -> String {
    match code {
        KeyCode::Up => "↑".to_string(),
        KeyCode::Down => "↓".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => "S-Tab".to_string(),
        KeyCode::Backspace => "Bksp".to_string(),
        KeyCode::Char(c) => c.to_string(),
        other => format!("{:?}", other),
    }
}

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// List view showing all markers
    MarkerList,
    /// Detail view for a specific marker
    MarkerDetail(String),
    /// Form for tracking a new location
    AddMarker,
}

/// Input field of the add-marker form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Latitude,
    Longitude,
    Name,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Latitude => FormField::Longitude,
            FormField::Longitude => FormField::Name,
            FormField::Name => FormField::Latitude,
        }
    }

    fn previous(self) -> Self {
        match self {
            FormField::Latitude => FormField::Name,
            FormField::Longitude => FormField::Latitude,
            FormField::Name => FormField::Longitude,
        }
    }
}

/// Text entered into the add-marker form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddMarkerForm {
    pub latitude: String,
    pub longitude: String,
    pub name: String,
    pub focus: FormField,
    /// Validation or server error shown under the fields
    pub error: Option<String>,
}

impl AddMarkerForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Latitude => &mut self.latitude,
            FormField::Longitude => &mut self.longitude,
            FormField::Name => &mut self.name,
        }
    }

    /// Parses the form into a create payload.
    ///
    /// # Returns
    /// * `Err(message)` describing the first invalid field
    pub fn to_new_marker(&self) -> Result<NewMarker, String> {
        let lat: f64 = self
            .latitude
            .trim()
            .parse()
            .map_err(|_| "Latitude must be a number".to_string())?;
        let lon: f64 = self
            .longitude
            .trim()
            .parse()
            .map_err(|_| "Longitude must be a number".to_string())?;
        cli::new_marker(lat, lon, Some(&self.name)).map_err(|e| e.to_string())
    }
}

/// A notification currently displayed on the toast line
#[derive(Debug, Clone)]
pub struct Toast {
    pub notification: Notification,
    pub shown_at: Instant,
}

impl Toast {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= TOAST_DURATION
    }
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Index of currently selected marker in list view
    pub selected_index: usize,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Scroll offset for marker detail view
    pub detail_scroll_offset: u16,
    /// Add-marker form contents
    pub form: AddMarkerForm,
    /// Latest notification, until it expires
    pub toast: Option<Toast>,
    /// Key for static map thumbnails in the detail view
    pub maps_api_key: Option<String>,
    sync: MarkerSync,
    notifications: UnboundedReceiver<Notification>,
    list: Subscription,
    detail: Option<Subscription>,
    add_state: watch::Receiver<MutationState>,
}

impl App {
    /// Creates the app on top of `sync`, showing the marker list
    ///
    /// Nothing is fetched until [`load`](Self::load) is called.
    pub fn new(sync: MarkerSync, notifications: UnboundedReceiver<Notification>) -> Self {
        let list = sync.subscribe(QueryKey::Markers);
        let add_state = sync.mutations().watch(MutationKind::Add);
        Self {
            state: AppState::MarkerList,
            selected_index: 0,
            should_quit: false,
            show_help: false,
            detail_scroll_offset: 0,
            form: AddMarkerForm::default(),
            toast: None,
            maps_api_key: None,
            sync,
            notifications,
            list,
            detail: None,
            add_state,
        }
    }

    pub fn with_maps_api_key(mut self, key: Option<String>) -> Self {
        self.maps_api_key = key;
        self
    }

    pub fn sync(&self) -> &MarkerSync {
        &self.sync
    }

    /// Starts the initial marker list fetch
    pub fn load(&self) {
        self.spawn_fetch(QueryKey::Markers);
    }

    /// Current marker list entry
    pub fn markers_entry(&self) -> CacheEntry {
        self.list.current()
    }

    /// Current entry of the marker shown in the detail view, if any
    pub fn detail_entry(&self) -> Option<CacheEntry> {
        self.detail.as_ref().map(Subscription::current)
    }

    /// Returns the number of markers currently listed
    pub fn marker_count(&self) -> usize {
        self.list.current().markers().map_or(0, <[Marker]>::len)
    }

    /// Returns the currently selected marker, if any
    pub fn selected_marker(&self) -> Option<Marker> {
        self.list
            .current()
            .markers()
            .and_then(|markers| markers.get(self.selected_index).cloned())
    }

    /// State of the add-marker mutation
    pub fn add_state(&self) -> MutationState {
        self.add_state.borrow().clone()
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// Key mappings:
    /// - `?`: Toggle help overlay
    /// - `q` (outside the form): Quit the application
    /// - `Up`/`k`, `Down`/`j`: Move selection in list, scroll in detail
    /// - `Enter`: Open the selected marker, or submit the add form
    /// - `a`: Open the add-marker form
    /// - `d`: Delete the selected (or shown) marker
    /// - `r`: Refresh the current view
    /// - `Esc`: Go back to the list, or quit from the list
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Help overlay intercepts all keys when shown
        if self.show_help {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return;
        }

        match self.state.clone() {
            AppState::MarkerList => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection_up();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection_down();
                }
                KeyCode::Enter => {
                    if let Some(marker) = self.selected_marker() {
                        self.open_detail(marker.marker_id);
                    }
                }
                KeyCode::Char('a') => {
                    self.open_add_form();
                }
                KeyCode::Char('d') => {
                    if let Some(marker) = self.selected_marker() {
                        self.spawn_delete(marker.marker_id);
                    }
                }
                KeyCode::Char('r') => {
                    self.refresh(QueryKey::Markers);
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            AppState::MarkerDetail(marker_id) => match key_event.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                }
                KeyCode::Esc => {
                    self.close_detail();
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    self.scroll_down();
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.scroll_up();
                }
                KeyCode::Char('d') => {
                    self.spawn_delete(marker_id);
                }
                KeyCode::Char('r') => {
                    self.refresh(QueryKey::Marker(marker_id));
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            AppState::AddMarker => match key_event.code {
                KeyCode::Esc => {
                    self.state = AppState::MarkerList;
                }
                KeyCode::Tab | KeyCode::Down => {
                    self.form.focus = self.form.focus.next();
                }
                KeyCode::BackTab | KeyCode::Up => {
                    self.form.focus = self.form.focus.previous();
                }
                KeyCode::Backspace => {
                    self.form.focused_mut().pop();
                }
                KeyCode::Enter => {
                    self.submit_add_form();
                }
                KeyCode::Char(c) => {
                    self.form.focused_mut().push(c);
                }
                _ => {}
            },
        }
    }

    /// Folds background outcomes into the view state
    ///
    /// Drains pending notifications onto the toast line, expires an old
    /// toast, reacts to the add mutation finishing and keeps the list
    /// selection in range.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        while let Ok(notification) = self.notifications.try_recv() {
            self.toast = Some(Toast {
                notification,
                shown_at: now,
            });
        }
        if self.toast.as_ref().is_some_and(|toast| toast.is_expired(now)) {
            self.toast = None;
        }

        if self.add_state.has_changed().unwrap_or(false) {
            let state = self.add_state.borrow_and_update().clone();
            if self.state == AppState::AddMarker {
                match state {
                    MutationState::Success => {
                        self.form = AddMarkerForm::default();
                        self.state = AppState::MarkerList;
                    }
                    MutationState::Error(message) => {
                        self.form.error = Some(message);
                    }
                    MutationState::Idle | MutationState::Loading => {}
                }
            }
        }

        let count = self.marker_count();
        if count > 0 && self.selected_index >= count {
            self.selected_index = count - 1;
        }
    }

    /// Shows `marker_id` in the detail view and fetches it
    pub fn open_detail(&mut self, marker_id: String) {
        let key = QueryKey::marker(marker_id.clone());
        self.attach_detail(marker_id);
        self.spawn_fetch(key);
    }

    /// Switches to the detail view of `marker_id` and subscribes to it
    pub fn attach_detail(&mut self, marker_id: String) {
        self.detail = Some(self.sync.subscribe(QueryKey::marker(marker_id.clone())));
        self.detail_scroll_offset = 0;
        self.state = AppState::MarkerDetail(marker_id);
    }

    /// Leaves the detail view, dropping its subscription
    pub fn close_detail(&mut self) {
        self.detail = None;
        self.detail_scroll_offset = 0;
        self.state = AppState::MarkerList;
    }

    fn open_add_form(&mut self) {
        self.form = AddMarkerForm::default();
        self.sync.mutations().reset(MutationKind::Add);
        // The reset itself is not an outcome to react to
        drop(self.add_state.borrow_and_update());
        self.state = AppState::AddMarker;
    }

    fn submit_add_form(&mut self) {
        if self.add_state().is_loading() {
            return;
        }
        match self.form.to_new_marker() {
            Ok(payload) => {
                self.form.error = None;
                let sync = self.sync.clone();
                tokio::spawn(async move {
                    // Outcome is reported through the notifier and mutation state
                    let _ = sync.mutations().add_marker(payload).await;
                });
            }
            Err(message) => {
                self.form.error = Some(message);
            }
        }
    }

    fn refresh(&self, key: QueryKey) {
        debug!(%key, "refresh requested");
        self.sync.queries().invalidate(&key);
        // Entries never fetched (or idle) are not refetched by invalidation
        self.spawn_fetch(key);
    }

    fn spawn_fetch(&self, key: QueryKey) {
        let sync = self.sync.clone();
        tokio::spawn(async move {
            sync.queries().fetch(key).await;
        });
    }

    fn spawn_delete(&self, marker_id: String) {
        let sync = self.sync.clone();
        tokio::spawn(async move {
            let _ = sync.mutations().delete_marker(&marker_id).await;
        });
    }

    /// Moves the selection up in the list, wrapping to bottom if at top
    fn move_selection_up(&mut self) {
        let count = self.marker_count();
        if count == 0 {
            return;
        }
        if self.selected_index == 0 {
            self.selected_index = count - 1;
        } else {
            self.selected_index -= 1;
        }
    }

    /// Moves the selection down in the list, wrapping to top if at bottom
    fn move_selection_down(&mut self) {
        let count = self.marker_count();
        if count == 0 {
            return;
        }
        self.selected_index = (self.selected_index + 1) % count;
    }

    /// Scrolls up in the detail view, stopping at 0
    pub fn scroll_up(&mut self) {
        self.detail_scroll_offset = self.detail_scroll_offset.saturating_sub(1);
    }

    /// Scrolls down in the detail view; the renderer clamps to content height
    pub fn scroll_down(&mut self) {
        const MAX_SCROLL: u16 = 100;
        if self.detail_scroll_offset < MAX_SCROLL {
            self.detail_scroll_offset += 1;
        }
    }
}
