use serde::{Deserialize, Serialize};

/// One competitive team in the elimination event.
///
/// The source replaces the full set on every metadata refresh; nothing is
/// merged incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub participants: u32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub lives: i64,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub eliminated: bool,
}

/// Sortable columns of the standings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSortColumn {
    Position,
    Name,
    Members,
    Score,
    Wins,
    Losses,
    Lives,
}

impl TeamSortColumn {
    pub fn next(&self) -> Self {
        match self {
            TeamSortColumn::Position => TeamSortColumn::Name,
            TeamSortColumn::Name => TeamSortColumn::Members,
            TeamSortColumn::Members => TeamSortColumn::Score,
            TeamSortColumn::Score => TeamSortColumn::Wins,
            TeamSortColumn::Wins => TeamSortColumn::Losses,
            TeamSortColumn::Losses => TeamSortColumn::Lives,
            TeamSortColumn::Lives => TeamSortColumn::Position,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TeamSortColumn::Position => "Pos",
            TeamSortColumn::Name => "Name",
            TeamSortColumn::Members => "Members",
            TeamSortColumn::Score => "Score",
            TeamSortColumn::Wins => "Wins",
            TeamSortColumn::Losses => "Losses",
            TeamSortColumn::Lives => "Lives",
        }
    }
}
