use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;
use crate::models::{AccountProfile, PlayerRecord, PlayerStatus, StatEstimate, TeamSummary};

/// Torn public API v2 root.
const API_BASE_URL: &str = "https://api.torn.com/v2";

/// Request timeout in seconds.
/// Torn usually answers in well under a second; anything past this is a
/// stuck connection, not a slow response.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Players fetched per roster page. This is the server-side maximum; a page
/// shorter than this is the authoritative end of the roster.
pub const ROSTER_PAGE_SIZE: usize = 100;

/// Client for the Torn City public API.
///
/// Clone is cheap - reqwest's Client uses an Arc internally.
#[derive(Clone)]
pub struct TornClient {
    client: Client,
    api_key: String,
}

impl TornClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| ApiError::InvalidResponse("API key is not a valid header value".into()))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// GET a path and return the body once it passed the error checks.
    ///
    /// Torn reports domain errors in-body, frequently with a 200 status, so
    /// the error envelope is checked before the HTTP status.
    async fn get_checked(&self, path: &str) -> Result<String, ApiError> {
        let url = format!("{}{}", API_BASE_URL, path);
        debug!(path, "Torn API request");

        let response = self.client.get(&url).headers(self.auth_headers()?).send().await?;
        let status = response.status();
        let body = response.text().await?;

        check_error_envelope(status, &body)?;
        Ok(body)
    }

    /// Fetch the authenticated user's profile.
    pub async fn fetch_profile(&self) -> Result<AccountProfile, ApiError> {
        let body = self.get_checked("/user/profile").await?;
        let wrapper: ProfileResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("profile: {}", e)))?;
        Ok(wrapper.profile.into_profile())
    }

    /// Fetch the current elimination standings.
    pub async fn fetch_teams(&self) -> Result<Vec<TeamSummary>, ApiError> {
        let body = self.get_checked("/torn/elimination").await?;
        let wrapper: EliminationResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("elimination: {}", e)))?;
        debug!(count = wrapper.elimination.len(), "Fetched elimination teams");
        Ok(wrapper.elimination.into_iter().map(RawTeam::into_summary).collect())
    }

    /// Fetch one page of a team's roster starting at `offset`.
    ///
    /// Records are normalized on the way in; each keeps its unprocessed
    /// source object for the inspect view.
    pub async fn fetch_team_page(
        &self,
        team_id: u64,
        offset: usize,
    ) -> Result<Vec<PlayerRecord>, ApiError> {
        let path = format!(
            "/torn/{}/eliminationteam?limit={}&offset={}",
            team_id, ROSTER_PAGE_SIZE, offset
        );
        let body = self.get_checked(&path).await?;
        let wrapper: TeamPageResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("team page: {}", e)))?;

        let mut players = Vec::with_capacity(wrapper.eliminationteam.len());
        for value in wrapper.eliminationteam {
            match parse_player(value) {
                Some(player) => players.push(player),
                None => debug!(team_id, "Skipping roster entry without an id"),
            }
        }
        Ok(players)
    }
}

/// Map the in-body error envelope or a non-success status to an `ApiError`.
fn check_error_envelope(status: StatusCode, body: &str) -> Result<(), ApiError> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(err) = envelope.error {
            return Err(ApiError::Api {
                code: err.code,
                message: err.error,
            });
        }
    }
    if !status.is_success() {
        return Err(ApiError::from_status(status, body));
    }
    Ok(())
}

/// Parse one roster entry, keeping the raw object alongside the normalized
/// record. Entries without any id are dropped; ids key the estimate merge.
fn parse_player(value: serde_json::Value) -> Option<PlayerRecord> {
    let raw: RawPlayer = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(_) => RawPlayer::default(),
    };
    let id = raw.id?;
    Some(PlayerRecord {
        id,
        name: raw.name,
        level: raw.level,
        status: PlayerStatus::normalized(
            raw.status.state.as_deref().unwrap_or(""),
            raw.status.description.as_deref().unwrap_or(""),
            raw.status.until,
        ),
        last_action: raw.last_action.relative.unwrap_or_default(),
        attacks: raw.attacks,
        score: raw.score,
        estimate: StatEstimate::placeholder(),
        raw: Some(value),
    })
}

// ============================================================================
// Internal API response types for parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: u32,
    #[serde(alias = "message")]
    error: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile: RawProfile,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    #[serde(alias = "player_id")]
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    status: RawStatus,
}

impl RawProfile {
    fn into_profile(self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            name: self.name,
            level: self.level,
            status: PlayerStatus::normalized(
                self.status.state.as_deref().unwrap_or(""),
                self.status.description.as_deref().unwrap_or(""),
                self.status.until,
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default, alias = "details")]
    description: Option<String>,
    #[serde(default)]
    until: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EliminationResponse {
    // Not defaulted: a payload without this field is a shape change, not an
    // empty standings list.
    elimination: Vec<RawTeam>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    participants: u32,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    losses: u32,
    #[serde(default)]
    lives: i64,
    #[serde(default)]
    position: u32,
    #[serde(default, alias = "is_eliminated")]
    eliminated: bool,
}

impl RawTeam {
    fn into_summary(self) -> TeamSummary {
        TeamSummary {
            id: self.id,
            name: self.name,
            participants: self.participants,
            score: self.score,
            wins: self.wins,
            losses: self.losses,
            lives: self.lives,
            position: self.position,
            eliminated: self.eliminated,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamPageResponse {
    // Not defaulted: an aborted parse must fail the session rather than
    // truncate the cached roster.
    eliminationteam: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayer {
    #[serde(default, alias = "player_id")]
    id: Option<u64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    status: RawStatus,
    #[serde(default)]
    last_action: RawLastAction,
    #[serde(default)]
    attacks: u32,
    #[serde(default)]
    score: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RawLastAction {
    #[serde(default)]
    relative: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayerState;

    #[test]
    fn test_parse_profile_response() {
        let json = r#"{
            "profile": {
                "id": 2114440,
                "name": "Duke",
                "level": 42,
                "status": {
                    "state": "Okay",
                    "description": "Okay",
                    "until": 0
                }
            }
        }"#;

        let wrapper: ProfileResponse = serde_json::from_str(json).unwrap();
        let profile = wrapper.profile.into_profile();
        assert_eq!(profile.id, 2114440);
        assert_eq!(profile.name, "Duke");
        assert_eq!(profile.level, 42);
        assert_eq!(profile.status.state, PlayerState::Okay);
        assert_eq!(profile.status.until, None);
    }

    #[test]
    fn test_parse_profile_with_player_id_alias() {
        let json = r#"{
            "profile": {
                "player_id": 777,
                "name": "Alt",
                "level": 3,
                "status": {"state": "Okay", "description": "Okay"}
            }
        }"#;

        let wrapper: ProfileResponse = serde_json::from_str(json).unwrap();
        assert_eq!(wrapper.profile.into_profile().id, 777);
    }

    #[test]
    fn test_parse_elimination_response() {
        let json = r#"{
            "elimination": [
                {
                    "id": 11,
                    "name": "Red Team",
                    "participants": 120,
                    "score": 450,
                    "wins": 30,
                    "losses": 12,
                    "lives": 88,
                    "position": 1,
                    "is_eliminated": false
                },
                {
                    "id": 12,
                    "name": "Blue Team"
                }
            ]
        }"#;

        let wrapper: EliminationResponse = serde_json::from_str(json).unwrap();
        let teams: Vec<TeamSummary> =
            wrapper.elimination.into_iter().map(RawTeam::into_summary).collect();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].name, "Red Team");
        assert_eq!(teams[0].position, 1);
        assert!(!teams[0].eliminated);
        // Missing fields default rather than failing the whole payload
        assert_eq!(teams[1].score, 0);
        assert_eq!(teams[1].participants, 0);
    }

    #[test]
    fn test_parse_team_page_keeps_raw_and_normalizes_status() {
        let json = r#"{
            "eliminationteam": [
                {
                    "id": 500001,
                    "name": "Bruiser",
                    "level": 35,
                    "status": {
                        "state": "Hospital",
                        "description": "In a Swiss hospital for 41 mins",
                        "until": 1750000000
                    },
                    "last_action": {"relative": "3 minutes ago"},
                    "attacks": 17,
                    "score": 340
                }
            ]
        }"#;

        let wrapper: TeamPageResponse = serde_json::from_str(json).unwrap();
        let players: Vec<PlayerRecord> = wrapper
            .eliminationteam
            .into_iter()
            .filter_map(parse_player)
            .collect();

        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.id, 500001);
        assert_eq!(
            p.status.state,
            PlayerState::Hospital {
                location: Some("Swiss".to_string())
            }
        );
        assert_eq!(p.status.until, Some(1750000000));
        assert_eq!(p.last_action, "3 minutes ago");
        assert!(p.estimate.is_placeholder());
        assert!(p.raw.is_some());
    }

    #[test]
    fn test_parse_team_page_drops_idless_entries() {
        let json = r#"{
            "eliminationteam": [
                {"name": "Ghost", "level": 1},
                {"player_id": 42, "name": "Real", "level": 2}
            ]
        }"#;

        let wrapper: TeamPageResponse = serde_json::from_str(json).unwrap();
        let players: Vec<PlayerRecord> = wrapper
            .eliminationteam
            .into_iter()
            .filter_map(parse_player)
            .collect();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, 42);
    }

    #[test]
    fn test_error_envelope_wins_over_status() {
        let body = r#"{"error": {"code": 2, "error": "Incorrect key"}}"#;
        let err = check_error_envelope(StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            ApiError::Api {
                code: 2,
                message: "Incorrect key".to_string()
            }
        );
        assert!(err.is_key_invalid());
    }

    #[test]
    fn test_non_success_status_without_envelope() {
        let err = check_error_envelope(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_success_status_passes() {
        assert!(check_error_envelope(StatusCode::OK, r#"{"profile": {}}"#).is_ok());
    }
}
