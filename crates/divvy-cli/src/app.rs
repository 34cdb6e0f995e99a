//! Application state machine and event dispatcher.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use divvy_core::{
  health::HealthRow, stats::DirectoryStats, subscriber::Subscriber, view::DashboardView,
};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};

use crate::client::ApiClient;

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the subscriber directory; right pane shows a hint.
  Directory,
  /// Focus on the selected subscriber's dashboard.
  Dashboard,
  /// Full-width credential pool health report.
  Health,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Current screen / keyboard focus.
  pub screen: Screen,

  /// All subscribers returned by the API on the last refresh.
  pub subscribers: Vec<Subscriber>,

  /// Directory counters shown in the header.
  pub stats: Option<DirectoryStats>,

  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Cursor position within the *filtered* subscriber list.
  pub list_cursor: usize,

  /// Dashboard of the currently-selected subscriber.
  pub dashboard: Option<DashboardView>,

  /// Credential health report, fetched when the health screen opens.
  pub health: Vec<HealthRow>,

  /// Fingerprint of the snapshot the current data came from.
  pub fingerprint: String,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Shared HTTP client.
  pub client: Arc<ApiClient>,
}

impl App {
  pub fn new(client: ApiClient) -> Self {
    Self {
      screen: Screen::Directory,
      subscribers: Vec::new(),
      stats: None,
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      dashboard: None,
      health: Vec::new(),
      fingerprint: String::new(),
      status_msg: String::new(),
      client: Arc::new(client),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch the directory, stats, and fingerprint from the API.
  pub async fn load(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading directory…".into();
    match self.client.list_subscribers().await {
      Ok(subscribers) => {
        self.subscribers = subscribers;
        self.list_cursor = self
          .list_cursor
          .min(self.subscribers.len().saturating_sub(1));
        self.stats = self.client.stats().await.ok();
        self.fingerprint = self.client.sync_fingerprint().await.unwrap_or_default();
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Refetch only when the server's fingerprint moved. Called on the manual
  /// refresh key; data is never recomputed locally from stale snapshots.
  pub async fn refresh_if_changed(&mut self) -> anyhow::Result<()> {
    match self.client.sync_fingerprint().await {
      Ok(current) if current == self.fingerprint => {
        self.status_msg = "Up to date.".into();
        Ok(())
      }
      Ok(_) => {
        tracing::debug!("fingerprint moved, refetching");
        self.load().await?;
        self.status_msg = "Refreshed.".into();
        if let Some(view) = &self.dashboard {
          let phone = view.phone.clone();
          self.open_dashboard(&phone).await.ok();
        }
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  // ── Filtered list ─────────────────────────────────────────────────────────

  /// Returns subscribers that match the current filter query.
  pub fn filtered_subscribers(&self) -> Vec<&Subscriber> {
    if self.filter.is_empty() {
      return self.subscribers.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    self
      .subscribers
      .iter()
      .filter(|s| {
        matcher.fuzzy_match(&s.name, &self.filter).is_some()
          || matcher.fuzzy_match(&s.phone, &self.filter).is_some()
      })
      .collect()
  }

  /// The subscriber under the list cursor in the filtered view, if any.
  pub fn cursor_subscriber(&self) -> Option<&Subscriber> {
    let list = self.filtered_subscribers();
    list.get(self.list_cursor).copied()
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if self.filter_active {
      return self.handle_filter_key(key).await;
    }

    match self.screen {
      Screen::Directory => self.handle_directory_key(key).await,
      Screen::Dashboard => self.handle_dashboard_key(key).await,
      Screen::Health => self.handle_health_key(key).await,
    }
  }

  async fn handle_filter_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        // Immediately open the dashboard if there's exactly one match.
        let phones: Vec<String> = self
          .filtered_subscribers()
          .iter()
          .map(|s| s.phone.clone())
          .collect();
        if let [phone] = phones.as_slice() {
          let phone = phone.clone();
          self.open_dashboard(&phone).await.ok();
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
    Ok(true)
  }

  async fn handle_directory_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_subscribers().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(phone) = self.cursor_subscriber().map(|s| s.phone.clone()) {
          self.open_dashboard(&phone).await.ok();
        }
      }

      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      KeyCode::Char('p') => {
        self.open_health().await.ok();
      }

      KeyCode::Char('r') => {
        self.refresh_if_changed().await.ok();
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_dashboard_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => {
        self.screen = Screen::Directory;
        self.dashboard = None;
      }

      // Navigate the list from the detail for quick switching.
      KeyCode::Char(']') | KeyCode::PageDown => {
        let len = self.filtered_subscribers().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
          if let Some(phone) = self.cursor_subscriber().map(|s| s.phone.clone()) {
            self.open_dashboard(&phone).await.ok();
          }
        }
      }
      KeyCode::Char('[') | KeyCode::PageUp => {
        if self.list_cursor > 0 {
          self.list_cursor -= 1;
          if let Some(phone) = self.cursor_subscriber().map(|s| s.phone.clone()) {
            self.open_dashboard(&phone).await.ok();
          }
        }
      }

      KeyCode::Char('r') => {
        self.refresh_if_changed().await.ok();
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_health_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Esc | KeyCode::Char('p') => {
        self.screen = Screen::Directory;
      }

      KeyCode::Char('r') => {
        self.open_health().await.ok();
      }

      _ => {}
    }
    Ok(true)
  }

  /// Transition to `Health`, fetching the current report.
  async fn open_health(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading…".into();
    match self.client.health().await {
      Ok(rows) => {
        self.health = rows;
        self.screen = Screen::Health;
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Transition to `Dashboard` for `phone`, fetching the derived view.
  async fn open_dashboard(&mut self, phone: &str) -> anyhow::Result<()> {
    self.status_msg = "Loading…".into();
    match self.client.dashboard(phone).await {
      Ok(view) => {
        self.dashboard = Some(view);
        self.screen = Screen::Dashboard;
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }
}
