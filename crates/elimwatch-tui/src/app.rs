//! Application state for the elimination dashboard TUI.
//!
//! `App` owns the UI state plus local copies of the coordinator's snapshots.
//! All fetching goes through the coordinator; settled refreshes come back
//! over one event channel, drained once per frame.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use elimwatch_core::api::{ApiError, DataSource, LiveDataSource};
use elimwatch_core::auth::{CredentialStore, Credentials};
use elimwatch_core::cache::{
    Coordinator, MetadataSnapshot, RefreshEvent, RefreshOutcome, RefreshScheduler,
    META_REFRESH_SECS, TEAM_REFRESH_SECS,
};
use elimwatch_core::config::Config;
use elimwatch_core::models::{
    PlayerRecord, PlayerSortColumn, PlayerState, TeamSortColumn, TeamSummary,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for key input fields.
/// Torn keys are 16 characters; stats service keys run longer.
const MAX_KEY_LENGTH: usize = 64;

/// Number of rows to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Step for the level filter bounds.
const LEVEL_BOUND_STEP: u32 = 5;

/// Upper limit of the level filter range.
pub const LEVEL_BOUND_MAX: u32 = 100;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Teams,
    Roster,
}

impl Tab {
    /// Get the display title for this tab.
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Teams => "Teams",
            Tab::Roster => "Roster",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Teams => Tab::Roster,
            Tab::Roster => Tab::Teams,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        self.next()
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    LoggingIn,
    ShowingHelp,
    Inspecting,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    ApiKey,
    StatsKey,
    Button,
}

/// Roster row filters. All matching is on the parsed state tag, never on
/// status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterFilters {
    pub level_min: u32,
    pub level_max: u32,
    pub okay_only: bool,
    pub include_traveling: bool,
    pub include_abroad: bool,
}

impl Default for RosterFilters {
    fn default() -> Self {
        Self {
            level_min: 0,
            level_max: LEVEL_BOUND_MAX,
            okay_only: false,
            include_traveling: true,
            include_abroad: true,
        }
    }
}

impl RosterFilters {
    /// Whether a roster row passes the current filter set.
    pub fn admits(&self, player: &PlayerRecord) -> bool {
        if player.level < self.level_min || player.level > self.level_max {
            return false;
        }
        match &player.status.state {
            PlayerState::Okay => true,
            PlayerState::Traveling { .. } => !self.okay_only && self.include_traveling,
            PlayerState::Abroad { .. } => !self.okay_only && self.include_abroad,
            _ => !self.okay_only,
        }
    }

    /// Active restrictions for the status bar, "no filters" when everything
    /// is admitted.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.level_min > 0 || self.level_max < LEVEL_BOUND_MAX {
            parts.push(format!("lvl {}-{}", self.level_min, self.level_max));
        }
        if self.okay_only {
            parts.push("okay only".to_string());
        }
        if !self.include_traveling {
            parts.push("no travel".to_string());
        }
        if !self.include_abroad {
            parts.push("no abroad".to_string());
        }
        if parts.is_empty() {
            "no filters".to_string()
        } else {
            parts.join(", ")
        }
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub coordinator: Coordinator,
    pub scheduler: Arc<RefreshScheduler>,

    // UI state
    pub state: AppState,
    pub current_tab: Tab,
    pub team_sort_column: TeamSortColumn,
    pub team_sort_ascending: bool,
    pub team_selection: usize,
    pub player_sort_column: PlayerSortColumn,
    pub player_sort_ascending: bool,
    pub player_selection: usize,
    pub filters: RosterFilters,

    // Login form state
    pub login_api_key: String,
    pub login_stats_key: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Local copies of the coordinator's snapshots, re-pulled when a refresh
    // settles so rendering never clones the full cache per frame
    pub metadata: MetadataSnapshot,
    pub roster: Vec<PlayerRecord>,
    pub roster_fetched_at: Option<DateTime<Utc>>,

    // Background event channel
    refresh_rx: mpsc::UnboundedReceiver<RefreshEvent>,
    refresh_tx: mpsc::UnboundedSender<RefreshEvent>,

    // Status message
    pub status_message: Option<String>,

    // Inspect overlay content (pretty-printed raw record)
    pub inspect_text: Option<String>,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        debug!("App::new() starting");
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config
            .cache_dir()
            .unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");
        let store = elimwatch_core::store::FileStore::new(cache_dir)?;

        let credentials = resolve_credentials(&config);
        let source = match &credentials {
            Some(creds) => match LiveDataSource::new(creds) {
                Ok(s) => Some(Arc::new(s) as Arc<dyn DataSource>),
                Err(e) => {
                    warn!(error = %e, "Failed to build API client");
                    None
                }
            },
            None => None,
        };
        debug!(has_source = source.is_some(), "Credentials resolved");

        let coordinator = Coordinator::new(source, Box::new(store));
        let scheduler = Arc::new(RefreshScheduler::new(coordinator.clone()));
        let (tx, rx) = mpsc::unbounded_channel();

        let metadata = coordinator.metadata_snapshot();

        let mut app = Self {
            config,
            coordinator,
            scheduler,

            state: AppState::Normal,
            current_tab: Tab::Teams,
            team_sort_column: TeamSortColumn::Position,
            team_sort_ascending: true,
            team_selection: 0,
            player_sort_column: PlayerSortColumn::Name,
            player_sort_ascending: true,
            player_selection: 0,
            filters: RosterFilters::default(),

            login_api_key: String::new(),
            login_stats_key: String::new(),
            login_focus: LoginFocus::ApiKey,
            login_error: None,

            metadata,
            roster: Vec::new(),
            roster_fetched_at: None,

            refresh_rx: rx,
            refresh_tx: tx,

            status_message: None,
            inspect_text: None,
        };
        // Show last run's roster for the watched team right away
        app.pull_roster();
        Ok(app)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Show the key-entry overlay.
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_api_key.is_empty() {
            LoginFocus::ApiKey
        } else {
            LoginFocus::Button
        };
        self.login_error = None;
    }

    /// Validate the entered keys and install them as the active source.
    ///
    /// The API key is probed with a profile fetch before it is accepted, so
    /// a typo never replaces working credentials.
    pub async fn attempt_login(&mut self) -> Result<()> {
        let api_key = self.login_api_key.trim().to_string();
        if api_key.is_empty() {
            self.login_error = Some("API key required".to_string());
            return Err(anyhow::anyhow!("API key required"));
        }

        let stats_key = self
            .config
            .stats_enabled
            .then(|| self.login_stats_key.clone());
        let credentials = Credentials::new(api_key, stats_key);
        self.login_error = None;

        let source = match LiveDataSource::new(&credentials) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to build API client");
                self.login_error = Some("Client setup failed".to_string());
                return Err(e.into());
            }
        };

        if let Err(e) = source.fetch_profile().await {
            error!(error = %e, "Key validation failed");
            self.login_error = Some(login_error_message(&e));
            return Err(e.into());
        }

        if self.config.remember_key {
            if let Err(e) = CredentialStore::store(&credentials) {
                warn!(error = %e, "Failed to store keys in the keychain");
            }
        }

        self.coordinator.set_source(Arc::new(source));
        self.metadata = self.coordinator.metadata_snapshot();
        self.pull_roster();

        self.login_api_key.clear();
        self.login_stats_key.clear();
        self.state = AppState::Normal;
        info!("API key accepted");

        // The source swap dropped all account-scoped entries; refill now
        self.spawn_metadata_refresh(true);
        if let Some(team_id) = self.coordinator.selected_team() {
            self.spawn_roster_refresh(team_id, true);
        }
        Ok(())
    }

    /// Forget stored keys and drop all account-scoped data.
    pub fn logout(&mut self) {
        if let Err(e) = CredentialStore::clear() {
            warn!(error = %e, "Failed to clear stored keys");
        }
        self.coordinator.clear();
        self.metadata = self.coordinator.metadata_snapshot();
        self.roster.clear();
        self.roster_fetched_at = None;
        self.status_message = Some("Keys forgotten".to_string());
        self.start_login();
    }

    // =========================================================================
    // Background Refresh
    // =========================================================================

    /// Start the periodic refresh scheduler, feeding this app's channel.
    pub fn start_scheduler(&self) {
        self.scheduler.start(self.refresh_tx.clone());
    }

    /// Stop the scheduler and wait until its task has exited.
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
    }

    /// Force-refresh the resource behind the current tab. The outcome comes
    /// back through the event channel like any scheduled refresh.
    pub fn force_refresh(&mut self) {
        match self.current_tab {
            Tab::Teams => {
                self.spawn_metadata_refresh(true);
                self.status_message = Some("Refreshing standings...".to_string());
            }
            Tab::Roster => match self.coordinator.selected_team() {
                Some(team_id) => {
                    self.spawn_roster_refresh(team_id, true);
                    self.status_message = Some("Refreshing roster...".to_string());
                }
                None => {
                    self.status_message = Some("No team selected".to_string());
                }
            },
        }
    }

    fn spawn_metadata_refresh(&self, force: bool) {
        let coordinator = self.coordinator.clone();
        let tx = self.refresh_tx.clone();
        tokio::spawn(async move {
            let outcome = coordinator.ensure_metadata_fresh(force).await;
            let _ = tx.send(RefreshEvent::Metadata(outcome));
        });
    }

    fn spawn_roster_refresh(&self, team_id: u64, force: bool) {
        let coordinator = self.coordinator.clone();
        let tx = self.refresh_tx.clone();
        tokio::spawn(async move {
            let outcome = coordinator.ensure_team_fresh(team_id, force).await;
            let _ = tx.send(RefreshEvent::Roster(team_id, outcome));
        });
    }

    /// Drain settled refreshes and fold them into the UI state.
    pub fn check_background_tasks(&mut self) {
        let mut events = Vec::new();
        while let Ok(event) = self.refresh_rx.try_recv() {
            events.push(event);
        }
        for event in events {
            self.process_refresh_event(event);
        }
    }

    fn process_refresh_event(&mut self, event: RefreshEvent) {
        match event {
            RefreshEvent::Metadata(outcome) => match outcome {
                RefreshOutcome::Updated => {
                    self.metadata = self.coordinator.metadata_snapshot();
                    self.clamp_team_selection();
                    self.status_message = None;
                }
                RefreshOutcome::Failed(e) => self.handle_refresh_failure("Standings", e),
                RefreshOutcome::Throttled => self.note_throttled(),
                RefreshOutcome::Fresh | RefreshOutcome::Superseded => {}
            },
            RefreshEvent::Roster(team_id, outcome) => {
                // A settled session for a team the user has moved away from
                // still updated the cache; only the view skips it.
                if Some(team_id) != self.coordinator.selected_team() {
                    return;
                }
                match outcome {
                    RefreshOutcome::Updated => {
                        self.pull_roster();
                        self.status_message = None;
                    }
                    RefreshOutcome::Failed(e) => self.handle_refresh_failure("Roster", e),
                    RefreshOutcome::Throttled => self.note_throttled(),
                    RefreshOutcome::Fresh | RefreshOutcome::Superseded => {}
                }
            }
        }
    }

    fn handle_refresh_failure(&mut self, what: &str, error: ApiError) {
        self.status_message = Some(format!("{} refresh failed: {}", what, error));
        // A rejected key will fail every future session; reopen the form
        if error.is_key_invalid() && self.state == AppState::Normal {
            self.login_error = Some(login_error_message(&error));
            self.start_login();
        }
    }

    fn note_throttled(&mut self) {
        // Only forced refreshes land here; scheduled ones are filtered out
        self.status_message = Some("Refresh skipped: last attempt too recent".to_string());
    }

    /// Copy the selected team's cached roster out of the coordinator.
    fn pull_roster(&mut self) {
        let snapshot = self
            .coordinator
            .selected_team()
            .and_then(|id| self.coordinator.roster_snapshot(id));
        match snapshot {
            Some(snapshot) => {
                self.roster = snapshot.players;
                self.roster_fetched_at = Some(snapshot.fetched_at);
            }
            None => {
                self.roster.clear();
                self.roster_fetched_at = None;
            }
        }
        self.clamp_player_selection();
    }

    // =========================================================================
    // Selection / Sorting / Filters
    // =========================================================================

    /// Standings rows in the current sort order.
    pub fn sorted_teams(&self) -> Vec<&TeamSummary> {
        let mut teams: Vec<&TeamSummary> = self.metadata.teams.iter().collect();
        sort_teams(&mut teams, self.team_sort_column, self.team_sort_ascending);
        teams
    }

    /// Roster rows that pass the filters, in the current sort order.
    pub fn visible_players(&self) -> Vec<&PlayerRecord> {
        let mut players: Vec<&PlayerRecord> = self
            .roster
            .iter()
            .filter(|p| self.filters.admits(p))
            .collect();
        sort_players(
            &mut players,
            self.player_sort_column,
            self.player_sort_ascending,
        );
        players
    }

    /// Watch the team under the cursor: persist the choice, switch to the
    /// roster tab, and force a refresh for it.
    pub fn select_team_at_cursor(&mut self) {
        let picked = self
            .sorted_teams()
            .get(self.team_selection)
            .map(|t| (t.id, t.name.clone()));
        let Some((team_id, name)) = picked else { return };

        self.coordinator.set_selected_team(Some(team_id));
        self.current_tab = Tab::Roster;
        self.player_selection = 0;
        self.pull_roster();
        self.spawn_roster_refresh(team_id, true);
        self.status_message = Some(format!("Watching {}", name));
    }

    /// Name of the watched team, when it is still in the standings.
    pub fn selected_team_name(&self) -> Option<&str> {
        let id = self.coordinator.selected_team()?;
        self.metadata
            .teams
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.as_str())
    }

    /// Move the current tab's selection by `delta` rows, clamped to range.
    pub fn move_selection(&mut self, delta: isize) {
        match self.current_tab {
            Tab::Teams => {
                let max = self.metadata.teams.len().saturating_sub(1);
                self.team_selection = step(self.team_selection, delta, max);
            }
            Tab::Roster => {
                let max = self.visible_players().len().saturating_sub(1);
                self.player_selection = step(self.player_selection, delta, max);
            }
        }
    }

    /// Advance the current tab's sort column.
    pub fn cycle_sort(&mut self) {
        match self.current_tab {
            Tab::Teams => self.team_sort_column = self.team_sort_column.next(),
            Tab::Roster => self.player_sort_column = self.player_sort_column.next(),
        }
    }

    /// Flip the current tab's sort direction.
    pub fn flip_sort(&mut self) {
        match self.current_tab {
            Tab::Teams => self.team_sort_ascending = !self.team_sort_ascending,
            Tab::Roster => self.player_sort_ascending = !self.player_sort_ascending,
        }
    }

    pub fn toggle_okay_only(&mut self) {
        self.filters.okay_only = !self.filters.okay_only;
        self.clamp_player_selection();
    }

    pub fn toggle_traveling(&mut self) {
        self.filters.include_traveling = !self.filters.include_traveling;
        self.clamp_player_selection();
    }

    pub fn toggle_abroad(&mut self) {
        self.filters.include_abroad = !self.filters.include_abroad;
        self.clamp_player_selection();
    }

    pub fn lower_level_min(&mut self) {
        self.filters.level_min = self.filters.level_min.saturating_sub(LEVEL_BOUND_STEP);
    }

    pub fn raise_level_min(&mut self) {
        self.filters.level_min =
            (self.filters.level_min + LEVEL_BOUND_STEP).min(self.filters.level_max);
        self.clamp_player_selection();
    }

    pub fn lower_level_max(&mut self) {
        self.filters.level_max = self
            .filters
            .level_max
            .saturating_sub(LEVEL_BOUND_STEP)
            .max(self.filters.level_min);
        self.clamp_player_selection();
    }

    pub fn raise_level_max(&mut self) {
        self.filters.level_max = (self.filters.level_max + LEVEL_BOUND_STEP).min(LEVEL_BOUND_MAX);
    }

    fn clamp_team_selection(&mut self) {
        let max = self.metadata.teams.len().saturating_sub(1);
        self.team_selection = self.team_selection.min(max);
    }

    fn clamp_player_selection(&mut self) {
        let max = self.visible_players().len().saturating_sub(1);
        self.player_selection = self.player_selection.min(max);
    }

    // =========================================================================
    // Overlays / Status
    // =========================================================================

    /// Open the inspect overlay with the raw source record of the selected
    /// roster row.
    pub fn inspect_selected_player(&mut self) {
        let text = self
            .visible_players()
            .get(self.player_selection)
            .map(|p| match &p.raw {
                Some(raw) => serde_json::to_string_pretty(raw)
                    .unwrap_or_else(|_| raw.to_string()),
                // Raw records are not persisted, so restored rows have none
                None => "No raw record for this row (restored from disk)".to_string(),
            });
        if let Some(text) = text {
            self.inspect_text = Some(text);
            self.state = AppState::Inspecting;
        }
    }

    pub fn close_inspect(&mut self) {
        self.inspect_text = None;
        self.state = AppState::Normal;
    }

    /// Seconds until metadata is due for a scheduled refresh.
    pub fn metadata_refresh_in(&self, now: DateTime<Utc>) -> Option<i64> {
        refresh_countdown(self.metadata.fetched_at, META_REFRESH_SECS, now)
    }

    /// Seconds until the watched roster is due for a scheduled refresh.
    pub fn roster_refresh_in(&self, now: DateTime<Utc>) -> Option<i64> {
        self.coordinator.selected_team()?;
        refresh_countdown(self.roster_fetched_at, TEAM_REFRESH_SECS, now)
    }
}

// ============================================================================
// Free Helpers
// ============================================================================

/// Env keys take precedence over the keychain so headless runs never touch
/// it; the keychain is only read when the user opted in.
fn resolve_credentials(config: &Config) -> Option<Credentials> {
    if let Some(creds) = credentials_from_env() {
        debug!("Using keys from environment");
        return Some(if config.stats_enabled {
            creds
        } else {
            Credentials::new(creds.api_key, None)
        });
    }
    if !config.remember_key {
        return None;
    }
    match CredentialStore::load() {
        Ok(Some(creds)) => Some(if config.stats_enabled {
            creds
        } else {
            Credentials::new(creds.api_key, None)
        }),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Keychain read failed");
            None
        }
    }
}

fn credentials_from_env() -> Option<Credentials> {
    let api_key = std::env::var("ELIMWATCH_API_KEY").ok()?;
    if api_key.trim().is_empty() {
        return None;
    }
    let stats_key = std::env::var("ELIMWATCH_STATS_KEY").ok();
    Some(Credentials::new(api_key, stats_key))
}

/// Map a key-probe failure to a message fit for the login overlay.
fn login_error_message(error: &ApiError) -> String {
    match error {
        e if e.is_key_invalid() => "API key rejected".to_string(),
        ApiError::Api { message, .. } => format!("API error: {}", message),
        ApiError::Network(_) => "Unable to connect. Check your internet connection.".to_string(),
        ApiError::InvalidResponse(_) => "Unexpected answer from the API. Try again.".to_string(),
    }
}

fn step(current: usize, delta: isize, max: usize) -> usize {
    if delta.is_negative() {
        current.saturating_sub(delta.unsigned_abs())
    } else {
        current.saturating_add(delta as usize).min(max)
    }
}

/// Seconds until an entry is due for its scheduled refresh, clamped at zero.
fn refresh_countdown(
    fetched_at: Option<DateTime<Utc>>,
    interval_secs: i64,
    now: DateTime<Utc>,
) -> Option<i64> {
    let due = fetched_at? + Duration::seconds(interval_secs);
    Some((due - now).num_seconds().max(0))
}

/// Rough ordering key for relative last-action text like "12 minutes ago".
/// Unparseable text sorts last.
fn last_action_order(text: &str) -> u64 {
    let mut parts = text.split_whitespace();
    let n: u64 = match parts.next().and_then(|p| p.parse().ok()) {
        Some(n) => n,
        None => return u64::MAX,
    };
    let scale = match parts.next() {
        Some(unit) if unit.starts_with("second") => 1,
        Some(unit) if unit.starts_with("minute") => 60,
        Some(unit) if unit.starts_with("hour") => 3_600,
        Some(unit) if unit.starts_with("day") => 86_400,
        _ => return u64::MAX,
    };
    n * scale
}

fn sort_teams(teams: &mut [&TeamSummary], column: TeamSortColumn, ascending: bool) {
    teams.sort_by(|a, b| {
        let ord = match column {
            TeamSortColumn::Position => a.position.cmp(&b.position),
            TeamSortColumn::Name => cmp_names(&a.name, &b.name),
            TeamSortColumn::Members => a.participants.cmp(&b.participants),
            TeamSortColumn::Score => a.score.cmp(&b.score),
            TeamSortColumn::Wins => a.wins.cmp(&b.wins),
            TeamSortColumn::Losses => a.losses.cmp(&b.losses),
            TeamSortColumn::Lives => a.lives.cmp(&b.lives),
        };
        direct(ord, ascending)
    });
}

fn sort_players(players: &mut [&PlayerRecord], column: PlayerSortColumn, ascending: bool) {
    players.sort_by(|a, b| {
        let ord = match column {
            PlayerSortColumn::Name => cmp_names(&a.name, &b.name),
            PlayerSortColumn::Level => a.level.cmp(&b.level),
            PlayerSortColumn::Status => a.status.state.order().cmp(&b.status.state.order()),
            PlayerSortColumn::LastAction => {
                last_action_order(&a.last_action).cmp(&last_action_order(&b.last_action))
            }
            PlayerSortColumn::Attacks => a.attacks.cmp(&b.attacks),
            PlayerSortColumn::Score => a.score.cmp(&b.score),
            PlayerSortColumn::Estimate => a
                .estimate
                .total
                .unwrap_or(0)
                .cmp(&b.estimate.total.unwrap_or(0)),
        };
        direct(ord, ascending)
    });
}

fn cmp_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn direct(ord: Ordering, ascending: bool) -> Ordering {
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

/// Check if a key input character should be accepted
pub fn can_add_key_char(current_len: usize, c: char) -> bool {
    current_len < MAX_KEY_LENGTH && c.is_ascii() && !c.is_ascii_control()
}

// ============================================================================
// Tests
// ============================================================================
