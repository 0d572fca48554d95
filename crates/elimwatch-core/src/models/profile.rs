use serde::{Deserialize, Serialize};

use crate::models::player::PlayerStatus;

/// Identity and current status of the authenticated user.
/// Replaced wholesale on each metadata refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    #[serde(alias = "player_id")]
    pub id: u64,
    pub name: String,
    pub level: u32,
    pub status: PlayerStatus,
}

impl AccountProfile {
    /// Header line for the dashboard, e.g. "Duke [42]".
    pub fn display_line(&self) -> String {
        format!("{} [{}]", self.name, self.level)
    }
}
