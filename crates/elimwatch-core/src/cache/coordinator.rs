use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiError, DataSource, ROSTER_PAGE_SIZE};
use crate::cache::entry::{CachedData, META_REFRESH_SECS, MIN_FETCH_SECS, TEAM_REFRESH_SECS};
use crate::models::{AccountProfile, PlayerRecord, TeamSummary};
use crate::store::StateStore;

/// Store key for the cached metadata document.
const METADATA_KEY: &str = "metadata";

/// Store key for the cached roster map. All teams live in one document; a
/// roster session rewrites the whole map.
const ROSTERS_KEY: &str = "rosters";

/// Store key for the selected team id.
const SELECTED_TEAM_KEY: &str = "selected_team";

/// Account profile and elimination standings, cached and refreshed as one
/// unit. The two halves come from separate endpoints and may update
/// independently within a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub profile: Option<AccountProfile>,
    #[serde(default)]
    pub teams: Vec<TeamSummary>,
}

/// How a refresh request ended, from the caller's point of view.
///
/// Every caller attached to the same in-flight session receives the same
/// value, which is why errors travel inside it instead of as a `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A session ran and the cache was rewritten.
    Updated,
    /// The entry was still fresh; nothing was fetched.
    Fresh,
    /// A fetch attempt ran too recently; nothing was fetched.
    Throttled,
    /// The session ran and failed; the cache is untouched.
    Failed(ApiError),
    /// Credentials changed while the session was in flight, so its result
    /// was discarded.
    Superseded,
}

/// A settled refresh, tagged with the entry it covered.
///
/// The scheduler and the front end's forced refreshes both feed these into
/// one channel so the UI has a single place to react to new data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Metadata(RefreshOutcome),
    Roster(u64, RefreshOutcome),
}

impl RefreshEvent {
    pub fn outcome(&self) -> &RefreshOutcome {
        match self {
            RefreshEvent::Metadata(outcome) => outcome,
            RefreshEvent::Roster(_, outcome) => outcome,
        }
    }
}

/// Copy of the cached metadata for rendering. `fetched_at` is None until the
/// first successful refresh.
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    pub profile: Option<AccountProfile>,
    pub teams: Vec<TeamSummary>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Copy of one cached roster for rendering.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    pub players: Vec<PlayerRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Identity of a refresh session for in-flight sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SessionKey {
    Metadata,
    Team(u64),
}

type SharedOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;

struct CoordinatorState {
    source: Option<Arc<dyn DataSource>>,
    metadata: Option<CachedData<Metadata>>,
    rosters: HashMap<u64, CachedData<Vec<PlayerRecord>>>,
    meta_attempt: Option<DateTime<Utc>>,
    team_attempts: HashMap<u64, DateTime<Utc>>,
    selected_team: Option<u64>,
    generation: u64,
}

/// Client-side cache coordinator for the elimination dashboard.
///
/// Owns the cached resources, decides when a fetch may run, shares in-flight
/// sessions between callers, and keeps the persistent store in step with
/// memory. Clone is cheap and shares the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    store: Box<dyn StateStore>,
    state: Mutex<CoordinatorState>,
    sessions: DashMap<SessionKey, SharedOutcome>,
}

impl Coordinator {
    /// Build a coordinator over a store, loading whatever it persisted last
    /// run. `source` stays None until credentials are supplied.
    pub fn new(source: Option<Arc<dyn DataSource>>, store: Box<dyn StateStore>) -> Self {
        let metadata = load_entry(&*store, METADATA_KEY);
        let rosters = load_entry(&*store, ROSTERS_KEY).unwrap_or_default();
        let selected_team = load_entry(&*store, SELECTED_TEAM_KEY);

        let state = CoordinatorState {
            source,
            metadata,
            rosters,
            meta_attempt: None,
            team_attempts: HashMap::new(),
            selected_team,
            generation: 0,
        };
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                state: Mutex::new(state),
                sessions: DashMap::new(),
            }),
        }
    }

    // ========================================================================
    // Refresh entry points
    // ========================================================================

    /// Make metadata fresh, fetching if staleness and the attempt floor
    /// allow. Concurrent callers share one in-flight session and all see its
    /// outcome. `force` bypasses the staleness check but never the floor.
    pub async fn ensure_metadata_fresh(&self, force: bool) -> RefreshOutcome {
        self.ensure(SessionKey::Metadata, force).await
    }

    /// Make one team's roster fresh. Sessions for different teams run in
    /// parallel; only same-team callers share a session.
    pub async fn ensure_team_fresh(&self, team_id: u64, force: bool) -> RefreshOutcome {
        self.ensure(SessionKey::Team(team_id), force).await
    }

    async fn ensure(&self, key: SessionKey, force: bool) -> RefreshOutcome {
        // The vacant arm runs under the registry shard lock, so check-then-
        // insert is atomic against other callers of the same key. Nothing
        // here may await until the match result is out.
        let shared = match self.inner.sessions.entry(key) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => match self.admit(key, force, Utc::now()) {
                Err(outcome) => return outcome,
                Ok((source, generation)) => {
                    let shared = self.spawn_session(key, source, generation);
                    vacant.insert(shared.clone());
                    shared
                }
            },
        };
        shared.await
    }

    /// Decide whether a session may start. On refusal the caller's outcome
    /// comes back as `Err`. On admission the attempt clock is stamped and
    /// the session's source and generation are captured.
    fn admit(
        &self,
        key: SessionKey,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<(Arc<dyn DataSource>, u64), RefreshOutcome> {
        let mut state = self.state();

        let Some(source) = state.source.clone() else {
            return Err(RefreshOutcome::Failed(ApiError::Api {
                code: 1,
                message: "Key is empty".to_string(),
            }));
        };

        if !force && !stale_in_state(&state, key, now) {
            return Err(RefreshOutcome::Fresh);
        }

        let last_attempt = match key {
            SessionKey::Metadata => state.meta_attempt,
            SessionKey::Team(team_id) => state.team_attempts.get(&team_id).copied(),
        };
        if let Some(last) = last_attempt {
            if now.signed_duration_since(last) < Duration::seconds(MIN_FETCH_SECS) {
                return Err(RefreshOutcome::Throttled);
            }
        }

        // Stamped at session start, whatever the outcome, so failures back
        // off at the floor too.
        match key {
            SessionKey::Metadata => state.meta_attempt = Some(now),
            SessionKey::Team(team_id) => {
                state.team_attempts.insert(team_id, now);
            }
        }
        Ok((source, state.generation))
    }

    /// Start the session task and wrap its handle in a shareable future.
    ///
    /// The task runs to completion even if every caller goes away. The
    /// registry entry is removed exactly once when the task settles, panics
    /// included.
    fn spawn_session(
        &self,
        key: SessionKey,
        source: Arc<dyn DataSource>,
        generation: u64,
    ) -> SharedOutcome {
        let coordinator = self.clone();
        let task = tokio::spawn(async move {
            let _cleanup = SessionCleanup {
                key,
                coordinator: coordinator.clone(),
            };
            match key {
                SessionKey::Metadata => coordinator.run_metadata_session(source, generation).await,
                SessionKey::Team(team_id) => {
                    coordinator.run_team_session(source, team_id, generation).await
                }
            }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => RefreshOutcome::Failed(ApiError::InvalidResponse(format!(
                    "refresh task aborted: {}",
                    e
                ))),
            }
        }
        .boxed()
        .shared()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Fetch profile and standings concurrently and apply what succeeded.
    ///
    /// The slices are independent: one failing keeps its previous data while
    /// the other updates. Both failing leaves the entry untouched, timestamp
    /// included, so staleness keeps firing.
    async fn run_metadata_session(
        &self,
        source: Arc<dyn DataSource>,
        generation: u64,
    ) -> RefreshOutcome {
        let (profile_result, teams_result) =
            tokio::join!(source.fetch_profile(), source.fetch_teams());

        if let (Err(profile_err), Err(teams_err)) = (&profile_result, &teams_result) {
            warn!(profile_error = %profile_err, teams_error = %teams_err, "Metadata refresh failed");
            return RefreshOutcome::Failed(profile_err.clone());
        }

        let now = Utc::now();
        let mut state = self.state();
        if state.generation != generation {
            debug!("Discarding metadata result from a superseded session");
            return RefreshOutcome::Superseded;
        }

        let mut data = state.metadata.take().map(|c| c.data).unwrap_or_default();
        match profile_result {
            Ok(profile) => data.profile = Some(profile),
            Err(e) => warn!(error = %e, "Profile slice failed, keeping previous"),
        }
        match teams_result {
            Ok(teams) => {
                debug!(count = teams.len(), "Standings updated");
                data.teams = teams;
            }
            Err(e) => warn!(error = %e, "Standings slice failed, keeping previous"),
        }

        let entry = CachedData::stamped(data, now);
        self.persist(METADATA_KEY, &entry);
        state.metadata = Some(entry);
        RefreshOutcome::Updated
    }

    /// Rebuild one team's roster page by page, estimates merged per page.
    ///
    /// All-or-nothing: any page or estimate failure aborts the session and
    /// the cached roster, timestamp included, stays as it was.
    async fn run_team_session(
        &self,
        source: Arc<dyn DataSource>,
        team_id: u64,
        generation: u64,
    ) -> RefreshOutcome {
        // One key check per session; an unusable key means every record
        // keeps its placeholder estimate.
        let enrich = source.check_stats_key().await;

        let mut players: Vec<PlayerRecord> = Vec::new();
        let mut offset = 0;
        loop {
            let mut page = match source.fetch_team_page(team_id, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(team_id, offset, error = %e, "Roster page fetch failed, session aborted");
                    return RefreshOutcome::Failed(e);
                }
            };
            let page_len = page.len();

            if enrich && !page.is_empty() {
                let ids: Vec<u64> = page.iter().map(|p| p.id).collect();
                match source.fetch_estimates(&ids).await {
                    Ok(estimates) => {
                        for player in &mut page {
                            if let Some(estimate) = estimates.get(&player.id) {
                                player.estimate = estimate.clone();
                            }
                        }
                    }
                    Err(e) => {
                        warn!(team_id, offset, error = %e, "Estimate lookup failed, session aborted");
                        return RefreshOutcome::Failed(e);
                    }
                }
            }

            players.extend(page);
            // A short page is the authoritative end of the roster
            if page_len < ROSTER_PAGE_SIZE {
                break;
            }
            offset += ROSTER_PAGE_SIZE;
        }

        debug!(team_id, count = players.len(), "Roster rebuilt");
        let now = Utc::now();
        let mut state = self.state();
        if state.generation != generation {
            debug!(team_id, "Discarding roster result from a superseded session");
            return RefreshOutcome::Superseded;
        }
        state
            .rosters
            .insert(team_id, CachedData::stamped(players, now));
        self.persist(ROSTERS_KEY, &state.rosters);
        RefreshOutcome::Updated
    }

    // ========================================================================
    // Snapshots and staleness
    // ========================================================================

    /// Current metadata, cloned out for rendering.
    pub fn metadata_snapshot(&self) -> MetadataSnapshot {
        let state = self.state();
        match &state.metadata {
            Some(cached) => MetadataSnapshot {
                profile: cached.data.profile.clone(),
                teams: cached.data.teams.clone(),
                fetched_at: Some(cached.fetched_at),
            },
            None => MetadataSnapshot::default(),
        }
    }

    /// One team's cached roster, cloned out for rendering. None when the
    /// team has never been fetched.
    pub fn roster_snapshot(&self, team_id: u64) -> Option<RosterSnapshot> {
        let state = self.state();
        state.rosters.get(&team_id).map(|cached| RosterSnapshot {
            players: cached.data.clone(),
            fetched_at: cached.fetched_at,
        })
    }

    pub fn is_metadata_stale(&self, now: DateTime<Utc>) -> bool {
        stale_in_state(&self.state(), SessionKey::Metadata, now)
    }

    pub fn is_team_stale(&self, team_id: u64, now: DateTime<Utc>) -> bool {
        stale_in_state(&self.state(), SessionKey::Team(team_id), now)
    }

    /// Age text for the status bar, e.g. "12s ago" or "never".
    pub fn metadata_age(&self, now: DateTime<Utc>) -> String {
        match &self.state().metadata {
            Some(cached) => cached.age_display(now),
            None => "never".to_string(),
        }
    }

    pub fn roster_age(&self, team_id: u64, now: DateTime<Utc>) -> String {
        match self.state().rosters.get(&team_id) {
            Some(cached) => cached.age_display(now),
            None => "never".to_string(),
        }
    }

    // ========================================================================
    // Selection and credentials
    // ========================================================================

    pub fn selected_team(&self) -> Option<u64> {
        self.state().selected_team
    }

    /// Remember which team the user is watching. Persisted so a restart
    /// reopens on the same roster.
    pub fn set_selected_team(&self, team_id: Option<u64>) {
        let mut state = self.state();
        state.selected_team = team_id;
        match team_id {
            Some(id) => self.persist(SELECTED_TEAM_KEY, &id),
            None => {
                if let Err(e) = self.inner.store.remove(SELECTED_TEAM_KEY) {
                    warn!(error = %e, "Failed to clear selected team");
                }
            }
        }
    }

    pub fn has_source(&self) -> bool {
        self.state().source.is_some()
    }

    /// Swap in a data source for new credentials.
    ///
    /// Every cached entry and attempt clock is dropped: data fetched under
    /// another account must not leak into this one. In-flight sessions keep
    /// running, but their results are discarded at apply time.
    pub fn set_source(&self, source: Arc<dyn DataSource>) {
        let mut state = self.state();
        state.generation += 1;
        state.source = Some(source);
        self.reset_entries(&mut state);
    }

    /// Drop the data source and every cached entry.
    pub fn clear(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.source = None;
        self.reset_entries(&mut state);
    }

    fn reset_entries(&self, state: &mut CoordinatorState) {
        state.metadata = None;
        state.rosters.clear();
        state.meta_attempt = None;
        state.team_attempts.clear();
        for key in [METADATA_KEY, ROSTERS_KEY] {
            if let Err(e) = self.inner.store.remove(key) {
                warn!(key, error = %e, "Failed to remove cache entry");
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write one document to the store. A store failure is logged and the
    /// in-memory update proceeds; the next successful write repairs the
    /// file.
    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(contents) => {
                if let Err(e) = self.inner.store.set(key, &contents) {
                    warn!(key, error = %e, "Failed to persist cache entry");
                }
            }
            Err(e) => warn!(key, error = %e, "Failed to serialize cache entry"),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.state.lock().unwrap()
    }
}

/// Removes the registry entry when the session settles, panics included.
struct SessionCleanup {
    key: SessionKey,
    coordinator: Coordinator,
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        self.coordinator.inner.sessions.remove(&self.key);
    }
}

fn stale_in_state(state: &CoordinatorState, key: SessionKey, now: DateTime<Utc>) -> bool {
    match key {
        SessionKey::Metadata => state
            .metadata
            .as_ref()
            .map_or(true, |c| c.is_stale(now, META_REFRESH_SECS)),
        SessionKey::Team(team_id) => state
            .rosters
            .get(&team_id)
            .map_or(true, |c| c.is_stale(now, TEAM_REFRESH_SECS)),
    }
}

/// Load one persisted document. A corrupt entry is reset to empty rather
/// than carried forward or allowed to fail startup.
fn load_entry<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(contents)) => match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Corrupt cache entry, resetting");
                if let Err(e) = store.remove(key) {
                    warn!(key, error = %e, "Failed to remove corrupt cache entry");
                }
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read cache entry");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlayerStatus, StatEstimate};
    use crate::store::{MemoryStore, StateStore};
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    fn sample_profile() -> AccountProfile {
        AccountProfile {
            id: 42,
            name: "Duke".to_string(),
            level: 42,
            status: PlayerStatus::normalized("Okay", "Okay", None),
        }
    }

    fn sample_team(id: u64, name: &str) -> TeamSummary {
        TeamSummary {
            id,
            name: name.to_string(),
            participants: 10,
            score: 5,
            wins: 1,
            losses: 0,
            lives: 20,
            position: 1,
            eliminated: false,
        }
    }

    fn sample_player(id: u64, name: &str) -> PlayerRecord {
        PlayerRecord {
            id,
            name: name.to_string(),
            level: 20,
            status: PlayerStatus::normalized("Okay", "Okay", None),
            last_action: "1 minute ago".to_string(),
            attacks: 0,
            score: 0,
            estimate: StatEstimate::placeholder(),
            raw: Some(serde_json::json!({ "id": id, "name": name })),
        }
    }

    fn page_of(range: std::ops::Range<u64>) -> Vec<PlayerRecord> {
        range.map(|i| sample_player(i, &format!("P{}", i))).collect()
    }

    /// Scripted data source with canned responses and call counters.
    struct ScriptedSource {
        profile: Mutex<Result<AccountProfile, ApiError>>,
        teams: Mutex<Result<Vec<TeamSummary>, ApiError>>,
        pages: Mutex<Vec<Result<Vec<PlayerRecord>, ApiError>>>,
        estimates: Mutex<Result<HashMap<u64, StatEstimate>, ApiError>>,
        stats_valid: AtomicBool,
        delay_ms: AtomicU64,
        profile_calls: AtomicUsize,
        teams_calls: AtomicUsize,
        estimate_calls: AtomicUsize,
        offsets: Mutex<Vec<usize>>,
    }

    impl Default for ScriptedSource {
        fn default() -> Self {
            Self {
                profile: Mutex::new(Ok(sample_profile())),
                teams: Mutex::new(Ok(vec![sample_team(11, "Red Team")])),
                pages: Mutex::new(vec![Ok(Vec::new())]),
                estimates: Mutex::new(Ok(HashMap::new())),
                stats_valid: AtomicBool::new(false),
                delay_ms: AtomicU64::new(0),
                profile_calls: AtomicUsize::new(0),
                teams_calls: AtomicUsize::new(0),
                estimate_calls: AtomicUsize::new(0),
                offsets: Mutex::new(Vec::new()),
            }
        }
    }

    impl ScriptedSource {
        fn with_pages(pages: Vec<Result<Vec<PlayerRecord>, ApiError>>) -> Self {
            let source = Self::default();
            *source.pages.lock().unwrap() = pages;
            source
        }

        fn set_profile(&self, result: Result<AccountProfile, ApiError>) {
            *self.profile.lock().unwrap() = result;
        }

        fn set_teams(&self, result: Result<Vec<TeamSummary>, ApiError>) {
            *self.teams.lock().unwrap() = result;
        }

        fn enable_stats(&self, estimates: Result<HashMap<u64, StatEstimate>, ApiError>) {
            self.stats_valid.store(true, Ordering::SeqCst);
            *self.estimates.lock().unwrap() = estimates;
        }

        fn set_delay(&self, ms: u64) {
            self.delay_ms.store(ms, Ordering::SeqCst);
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }

        async fn delay(&self) {
            let ms = self.delay_ms.load(Ordering::SeqCst);
            if ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            }
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        async fn fetch_profile(&self) -> Result<AccountProfile, ApiError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            let result = self.profile.lock().unwrap().clone();
            self.delay().await;
            result
        }

        async fn fetch_teams(&self) -> Result<Vec<TeamSummary>, ApiError> {
            self.teams_calls.fetch_add(1, Ordering::SeqCst);
            let result = self.teams.lock().unwrap().clone();
            self.delay().await;
            result
        }

        async fn fetch_team_page(
            &self,
            _team_id: u64,
            offset: usize,
        ) -> Result<Vec<PlayerRecord>, ApiError> {
            let result = {
                let mut offsets = self.offsets.lock().unwrap();
                offsets.push(offset);
                let index = offsets.len() - 1;
                let pages = self.pages.lock().unwrap();
                pages.get(index).cloned().unwrap_or_else(|| Ok(Vec::new()))
            };
            self.delay().await;
            result
        }

        async fn check_stats_key(&self) -> bool {
            self.stats_valid.load(Ordering::SeqCst)
        }

        async fn fetch_estimates(
            &self,
            _ids: &[u64],
        ) -> Result<HashMap<u64, StatEstimate>, ApiError> {
            self.estimate_calls.fetch_add(1, Ordering::SeqCst);
            self.estimates.lock().unwrap().clone()
        }
    }

    fn coordinator_with(source: &Arc<ScriptedSource>) -> (Coordinator, MemoryStore) {
        let store = MemoryStore::new();
        let dyn_source: Arc<dyn DataSource> = source.clone();
        let coordinator = Coordinator::new(Some(dyn_source), Box::new(store.clone()));
        (coordinator, store)
    }

    /// Age the attempt clock and cached entry by `secs`, as if that much
    /// wall time had passed.
    fn rewind_metadata_clocks(coordinator: &Coordinator, secs: i64) {
        let mut state = coordinator.state();
        let delta = Duration::seconds(secs);
        if let Some(at) = state.meta_attempt {
            state.meta_attempt = Some(at - delta);
        }
        if let Some(entry) = state.metadata.as_mut() {
            entry.fetched_at = entry.fetched_at - delta;
        }
    }

    fn rewind_team_clocks(coordinator: &Coordinator, team_id: u64, secs: i64) {
        let mut state = coordinator.state();
        let delta = Duration::seconds(secs);
        if let Some(at) = state.team_attempts.get_mut(&team_id) {
            *at = *at - delta;
        }
        if let Some(entry) = state.rosters.get_mut(&team_id) {
            entry.fetched_at = entry.fetched_at - delta;
        }
    }

    #[tokio::test]
    async fn test_metadata_refresh_populates_cache() {
        let source = Arc::new(ScriptedSource::default());
        let (coordinator, _store) = coordinator_with(&source);

        assert!(coordinator.is_metadata_stale(Utc::now()));
        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Updated
        );

        let snapshot = coordinator.metadata_snapshot();
        assert_eq!(snapshot.profile.unwrap().name, "Duke");
        assert_eq!(snapshot.teams.len(), 1);
        assert!(snapshot.fetched_at.is_some());
        assert!(!coordinator.is_metadata_stale(Utc::now()));
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch() {
        let source = Arc::new(ScriptedSource::default());
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Updated
        );
        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Fresh
        );
        assert_eq!(source.profile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensures_share_one_session() {
        let source = Arc::new(ScriptedSource::default());
        source.set_delay(30);
        let (coordinator, _store) = coordinator_with(&source);

        let outcomes = join_all((0..8).map(|_| coordinator.ensure_metadata_fresh(false))).await;

        assert_eq!(source.profile_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.teams_calls.load(Ordering::SeqCst), 1);
        for outcome in outcomes {
            assert_eq!(outcome, RefreshOutcome::Updated);
        }
    }

    #[tokio::test]
    async fn test_concurrent_same_team_share_one_session() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(vec![sample_player(
            1, "A",
        )])]));
        source.set_delay(20);
        let (coordinator, _store) = coordinator_with(&source);

        let (first, second) = tokio::join!(
            coordinator.ensure_team_fresh(7, false),
            coordinator.ensure_team_fresh(7, false)
        );
        assert_eq!(first, RefreshOutcome::Updated);
        assert_eq!(second, RefreshOutcome::Updated);
        assert_eq!(source.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_different_teams_fetch_independently() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(vec![sample_player(1, "A")]),
            Ok(vec![sample_player(2, "B")]),
        ]));
        source.set_delay(20);
        let (coordinator, _store) = coordinator_with(&source);

        let (first, second) = tokio::join!(
            coordinator.ensure_team_fresh(1, false),
            coordinator.ensure_team_fresh(2, false)
        );
        assert_eq!(first, RefreshOutcome::Updated);
        assert_eq!(second, RefreshOutcome::Updated);
        assert_eq!(source.offsets().len(), 2);
        assert!(coordinator.roster_snapshot(1).is_some());
        assert!(coordinator.roster_snapshot(2).is_some());
    }

    #[tokio::test]
    async fn test_forced_refreshes_inside_floor_run_once() {
        let source = Arc::new(ScriptedSource::default());
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_metadata_fresh(true).await,
            RefreshOutcome::Updated
        );
        // Well inside the attempt floor: forcing bypasses staleness, not
        // the floor
        assert_eq!(
            coordinator.ensure_metadata_fresh(true).await,
            RefreshOutcome::Throttled
        );
        assert_eq!(source.profile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_floor_applies_after_failure() {
        let source = Arc::new(ScriptedSource::default());
        source.set_profile(Err(ApiError::Network("offline".into())));
        source.set_teams(Err(ApiError::Network("offline".into())));
        let (coordinator, _store) = coordinator_with(&source);

        assert!(matches!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Failed(_)
        ));
        // Cache is still empty and stale, but the floor holds the retry back
        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Throttled
        );
        assert_eq!(source.profile_calls.load(Ordering::SeqCst), 1);

        rewind_metadata_clocks(&coordinator, MIN_FETCH_SECS + 1);
        assert!(matches!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Failed(_)
        ));
        assert_eq!(source.profile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metadata_partial_slice_failure_still_updates() {
        let source = Arc::new(ScriptedSource::default());
        source.set_profile(Err(ApiError::Network("dns failure".into())));
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Updated
        );
        let snapshot = coordinator.metadata_snapshot();
        assert!(snapshot.profile.is_none());
        assert_eq!(snapshot.teams.len(), 1);
        assert!(snapshot.fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_metadata_keeps_previous_slice_on_failure() {
        let source = Arc::new(ScriptedSource::default());
        let (coordinator, _store) = coordinator_with(&source);
        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Updated
        );

        rewind_metadata_clocks(&coordinator, 60);
        let stamped = coordinator.metadata_snapshot().fetched_at.unwrap();

        source.set_profile(Err(ApiError::Network("dns failure".into())));
        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Updated
        );

        let snapshot = coordinator.metadata_snapshot();
        // Previous profile survives while standings refreshed
        assert_eq!(snapshot.profile.unwrap().name, "Duke");
        assert!(snapshot.fetched_at.unwrap() > stamped);
    }

    #[tokio::test]
    async fn test_metadata_both_slices_failing_leaves_entry_untouched() {
        let source = Arc::new(ScriptedSource::default());
        let (coordinator, _store) = coordinator_with(&source);
        assert_eq!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Updated
        );

        rewind_metadata_clocks(&coordinator, 60);
        let stamped = coordinator.metadata_snapshot().fetched_at;

        source.set_profile(Err(ApiError::Network("dns failure".into())));
        source.set_teams(Err(ApiError::Network("dns failure".into())));
        assert!(matches!(
            coordinator.ensure_metadata_fresh(false).await,
            RefreshOutcome::Failed(_)
        ));

        let snapshot = coordinator.metadata_snapshot();
        assert_eq!(snapshot.fetched_at, stamped);
        assert_eq!(snapshot.teams.len(), 1);
    }

    #[tokio::test]
    async fn test_roster_pages_concatenate_in_order() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(page_of(1000..1100)),
            Ok(page_of(1100..1200)),
            Ok(page_of(1200..1237)),
        ]));
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_team_fresh(7, false).await,
            RefreshOutcome::Updated
        );
        assert_eq!(source.offsets(), vec![0, 100, 200]);

        let roster = coordinator.roster_snapshot(7).unwrap();
        assert_eq!(roster.players.len(), 237);
        let ids: Vec<u64> = roster.players.iter().map(|p| p.id).collect();
        let expected: Vec<u64> = (1000..1237).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_roster_failure_leaves_cache_untouched() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(vec![sample_player(1, "A"), sample_player(2, "B")]),
            Ok(page_of(0..100)),
            Err(ApiError::Network("connection reset".into())),
        ]));
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_team_fresh(7, false).await,
            RefreshOutcome::Updated
        );
        assert_eq!(coordinator.roster_snapshot(7).unwrap().players.len(), 2);

        rewind_team_clocks(&coordinator, 7, 60);
        let stamped = coordinator.roster_snapshot(7).unwrap().fetched_at;

        let outcome = coordinator.ensure_team_fresh(7, false).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(ApiError::Network(_))));

        let after = coordinator.roster_snapshot(7).unwrap();
        assert_eq!(after.players.len(), 2);
        assert_eq!(after.fetched_at, stamped);
        // The failed session fetched two pages before aborting
        assert_eq!(source.offsets(), vec![0, 0, 100]);
    }

    #[tokio::test]
    async fn test_estimates_merged_with_placeholder_gaps() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(vec![
            sample_player(1, "A"),
            sample_player(2, "B"),
            sample_player(3, "C"),
        ])]));
        source.enable_stats(Ok(HashMap::from([
            (
                1,
                StatEstimate {
                    label: "2.5m".to_string(),
                    total: Some(2_500_000),
                },
            ),
            (
                3,
                StatEstimate {
                    label: "900k".to_string(),
                    total: Some(900_000),
                },
            ),
        ])));
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_team_fresh(7, false).await,
            RefreshOutcome::Updated
        );
        assert_eq!(source.estimate_calls.load(Ordering::SeqCst), 1);

        let roster = coordinator.roster_snapshot(7).unwrap();
        assert_eq!(roster.players[0].estimate.total, Some(2_500_000));
        assert!(roster.players[1].estimate.is_placeholder());
        assert_eq!(roster.players[2].estimate.total, Some(900_000));
    }

    #[tokio::test]
    async fn test_estimate_failure_aborts_session() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(vec![sample_player(
            1, "A",
        )])]));
        source.enable_stats(Err(ApiError::Network("stats down".into())));
        let (coordinator, _store) = coordinator_with(&source);

        assert!(matches!(
            coordinator.ensure_team_fresh(7, false).await,
            RefreshOutcome::Failed(_)
        ));
        assert!(coordinator.roster_snapshot(7).is_none());
    }

    #[tokio::test]
    async fn test_estimates_skipped_without_usable_key() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(vec![sample_player(
            1, "A",
        )])]));
        let (coordinator, _store) = coordinator_with(&source);

        assert_eq!(
            coordinator.ensure_team_fresh(7, false).await,
            RefreshOutcome::Updated
        );
        assert_eq!(source.estimate_calls.load(Ordering::SeqCst), 0);
        let roster = coordinator.roster_snapshot(7).unwrap();
        assert!(roster.players[0].estimate.is_placeholder());
    }

    #[tokio::test]
    async fn test_persisted_state_survives_restart() {
        let store = MemoryStore::new();
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(vec![sample_player(
            1, "A",
        )])]));
        let dyn_source: Arc<dyn DataSource> = source.clone();
        let coordinator = Coordinator::new(Some(dyn_source), Box::new(store.clone()));

        coordinator.ensure_metadata_fresh(false).await;
        coordinator.ensure_team_fresh(7, false).await;
        coordinator.set_selected_team(Some(7));
        let meta_before = coordinator.metadata_snapshot();
        let roster_before = coordinator.roster_snapshot(7).unwrap();

        // Fresh coordinator over the same store, as after a restart
        let reloaded = Coordinator::new(None, Box::new(store.clone()));
        let meta_after = reloaded.metadata_snapshot();
        let roster_after = reloaded.roster_snapshot(7).unwrap();

        assert_eq!(meta_after.fetched_at, meta_before.fetched_at);
        assert_eq!(meta_after.profile, meta_before.profile);
        assert_eq!(meta_after.teams, meta_before.teams);
        assert_eq!(roster_after.fetched_at, roster_before.fetched_at);
        assert_eq!(roster_after.players.len(), 1);
        assert_eq!(roster_after.players[0].name, "A");
        // Raw payloads are dropped by serialization
        assert!(roster_before.players[0].raw.is_some());
        assert_eq!(roster_after.players[0].raw, None);
        assert_eq!(reloaded.selected_team(), Some(7));
    }

    #[test]
    fn test_corrupt_persisted_entries_reset() {
        let store = MemoryStore::new();
        store.set(METADATA_KEY, "{not json").unwrap();
        store
            .set(ROSTERS_KEY, r#"{"7": {"bogus": true}}"#)
            .unwrap();

        let coordinator = Coordinator::new(None, Box::new(store.clone()));
        assert!(coordinator.metadata_snapshot().fetched_at.is_none());
        assert!(coordinator.roster_snapshot(7).is_none());
        // Corrupt documents were dropped so the next run starts clean
        assert_eq!(store.get(METADATA_KEY).unwrap(), None);
        assert_eq!(store.get(ROSTERS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_credential_swap_discards_in_flight_session() {
        let source = Arc::new(ScriptedSource::default());
        source.set_delay(50);
        let (coordinator, _store) = coordinator_with(&source);

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.ensure_metadata_fresh(false).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let replacement: Arc<dyn DataSource> = Arc::new(ScriptedSource::default());
        coordinator.set_source(replacement);

        assert_eq!(pending.await.unwrap(), RefreshOutcome::Superseded);
        assert!(coordinator.metadata_snapshot().fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_without_source_refresh_fails_as_key_missing() {
        let coordinator = Coordinator::new(None, Box::new(MemoryStore::new()));
        match coordinator.ensure_metadata_fresh(false).await {
            RefreshOutcome::Failed(e) => assert!(e.is_key_invalid()),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_drops_cache_and_store() {
        let source = Arc::new(ScriptedSource::default());
        let (coordinator, store) = coordinator_with(&source);
        coordinator.ensure_metadata_fresh(false).await;
        assert!(store.get(METADATA_KEY).unwrap().is_some());

        coordinator.clear();
        assert!(!coordinator.has_source());
        assert!(coordinator.metadata_snapshot().fetched_at.is_none());
        assert_eq!(store.get(METADATA_KEY).unwrap(), None);
    }
}
