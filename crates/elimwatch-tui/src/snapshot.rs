//! One-shot snapshot dump of the full elimination state.
//!
//! Runs without the terminal UI and talks to the API directly. A dump walks
//! every team sequentially, so it deliberately paces itself well below the
//! rate limit instead of going through the cache coordinator.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use elimwatch_core::api::{ApiError, DataSource, LiveDataSource, ROSTER_PAGE_SIZE};
use elimwatch_core::auth::{CredentialStore, Credentials};
use elimwatch_core::models::{PlayerRecord, TeamSummary};

/// Pause between consecutive API calls while dumping.
const SNAPSHOT_THROTTLE_MS: u64 = 3000;

#[derive(Serialize)]
struct SnapshotDocument {
    generated_at: String,
    teams: Vec<SnapshotTeam>,
}

#[derive(Serialize)]
struct SnapshotTeam {
    id: u64,
    name: String,
    eliminated: bool,
    lives: i64,
    members: Vec<SnapshotMember>,
}

#[derive(Serialize)]
struct SnapshotMember {
    id: u64,
    name: String,
    level: u32,
    status: String,
    last_action: String,
    score: i64,
}

/// Fetch every team and its full roster, then write the result as JSON.
///
/// Teams whose roster fetch fails are skipped with a note on stderr; one
/// bad team should not sink a dump that is minutes into its run.
pub async fn dump_snapshot(out: PathBuf) -> Result<()> {
    let credentials = resolve_snapshot_key()?;
    let source = LiveDataSource::new(&credentials).context("Failed to set up the API client")?;

    let teams = source
        .fetch_teams()
        .await
        .context("Failed to fetch the team list")?;
    eprintln!("Fetched {} teams, dumping rosters...", teams.len());

    let total = teams.len();
    let mut snapshot_teams = Vec::with_capacity(total);
    for (index, team) in teams.into_iter().enumerate() {
        eprintln!("[{}/{}] {} ({})...", index + 1, total, team.name, team.id);
        throttle().await;
        match fetch_full_roster(&source, team.id).await {
            Ok(members) => snapshot_teams.push(snapshot_team(team, &members)),
            Err(error) => {
                eprintln!("  skipped: {}", error);
            }
        }
    }

    let document = SnapshotDocument {
        generated_at: Utc::now().to_rfc3339(),
        teams: snapshot_teams,
    };

    let json = serde_json::to_string_pretty(&document).context("Failed to serialize snapshot")?;
    std::fs::write(&out, json)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    eprintln!("Wrote {} ({} teams)", out.display(), document.teams.len());
    Ok(())
}

/// API key for a dump: environment first, then the stored key, then a
/// prompt. The stats key is never needed here.
fn resolve_snapshot_key() -> Result<Credentials> {
    if let Ok(key) = std::env::var("ELIMWATCH_API_KEY") {
        if !key.trim().is_empty() {
            return Ok(Credentials::new(key, None));
        }
    }

    if let Ok(Some(stored)) = CredentialStore::load() {
        return Ok(Credentials::new(stored.api_key, None));
    }

    let key = rpassword::prompt_password("Torn API key: ").context("Failed to read API key")?;
    if key.trim().is_empty() {
        anyhow::bail!("An API key is required to dump a snapshot");
    }
    Ok(Credentials::new(key, None))
}

async fn fetch_full_roster(
    source: &LiveDataSource,
    team_id: u64,
) -> Result<Vec<PlayerRecord>, ApiError> {
    let mut members = Vec::new();
    let mut offset = 0;
    loop {
        let page = source.fetch_team_page(team_id, offset).await?;
        let page_len = page.len();
        members.extend(page);
        if page_len < ROSTER_PAGE_SIZE {
            break;
        }
        offset += ROSTER_PAGE_SIZE;
        throttle().await;
    }
    Ok(members)
}

fn snapshot_team(team: TeamSummary, members: &[PlayerRecord]) -> SnapshotTeam {
    SnapshotTeam {
        id: team.id,
        name: team.name,
        eliminated: team.eliminated,
        lives: team.lives,
        members: members.iter().map(snapshot_member).collect(),
    }
}

fn snapshot_member(player: &PlayerRecord) -> SnapshotMember {
    SnapshotMember {
        id: player.id,
        name: player.name.clone(),
        level: player.level,
        status: player.status.display(),
        last_action: player.last_action.clone(),
        score: player.score,
    }
}

async fn throttle() {
    tokio::time::sleep(Duration::from_millis(SNAPSHOT_THROTTLE_MS)).await;
}
