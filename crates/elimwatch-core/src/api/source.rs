use std::collections::HashMap;

use async_trait::async_trait;

use crate::api::error::ApiError;
use crate::api::stats::StatsClient;
use crate::api::torn::TornClient;
use crate::auth::Credentials;
use crate::models::{AccountProfile, PlayerRecord, StatEstimate, TeamSummary};

/// Remote data capability consumed by the cache coordinator.
///
/// The coordinator never talks to a transport directly; everything it needs
/// from the network comes through this trait, so tests drive it with a
/// scripted implementation. Failures come back as values.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the authenticated user's profile.
    async fn fetch_profile(&self) -> Result<AccountProfile, ApiError>;

    /// Fetch the current elimination standings.
    async fn fetch_teams(&self) -> Result<Vec<TeamSummary>, ApiError>;

    /// Fetch one roster page for a team, starting at `offset`.
    async fn fetch_team_page(
        &self,
        team_id: u64,
        offset: usize,
    ) -> Result<Vec<PlayerRecord>, ApiError>;

    /// Whether the enrichment key is usable this session. False when no key
    /// is configured; transport failures also count as unusable.
    async fn check_stats_key(&self) -> bool;

    /// Fetch stat estimates for a batch of player ids. Ids the service does
    /// not cover are simply absent from the result.
    async fn fetch_estimates(&self, ids: &[u64]) -> Result<HashMap<u64, StatEstimate>, ApiError>;
}

/// Production data source: the Torn API plus the optional stats service.
pub struct LiveDataSource {
    torn: TornClient,
    stats: Option<StatsClient>,
}

impl LiveDataSource {
    pub fn new(credentials: &Credentials) -> Result<Self, ApiError> {
        let torn = TornClient::new(credentials.api_key.clone())?;
        let stats = credentials
            .stats_key
            .as_deref()
            .map(StatsClient::new)
            .transpose()?;
        Ok(Self { torn, stats })
    }
}

#[async_trait]
impl DataSource for LiveDataSource {
    async fn fetch_profile(&self) -> Result<AccountProfile, ApiError> {
        self.torn.fetch_profile().await
    }

    async fn fetch_teams(&self) -> Result<Vec<TeamSummary>, ApiError> {
        self.torn.fetch_teams().await
    }

    async fn fetch_team_page(
        &self,
        team_id: u64,
        offset: usize,
    ) -> Result<Vec<PlayerRecord>, ApiError> {
        self.torn.fetch_team_page(team_id, offset).await
    }

    async fn check_stats_key(&self) -> bool {
        match &self.stats {
            Some(stats) => stats.check_key().await,
            None => false,
        }
    }

    async fn fetch_estimates(&self, ids: &[u64]) -> Result<HashMap<u64, StatEstimate>, ApiError> {
        match &self.stats {
            Some(stats) => stats.fetch_estimates(ids).await,
            // Only reached after a passing key check, so treat it as an
            // empty coverage map rather than an error.
            None => Ok(HashMap::new()),
        }
    }
}
