use serde::{Deserialize, Serialize};

/// Direction of a travel status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelDirection {
    Outbound,
    Returning,
}

/// Player activity state, parsed once when a record is ingested.
///
/// The source reports state as a string plus a free-text description; the
/// location information only exists inside the description. Parsing it here
/// means filters and renderers match on tags instead of re-running string
/// heuristics on every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Okay,
    Hospital {
        /// Captured from "In a X hospital"; None for a home hospital stay.
        location: Option<String>,
    },
    Traveling {
        direction: TravelDirection,
        place: String,
    },
    Abroad {
        place: String,
    },
    Unknown,
}

impl PlayerState {
    /// Parse the source's state string + description into a tagged state.
    pub fn parse(state: &str, description: &str) -> Self {
        match state {
            "Okay" => PlayerState::Okay,
            "Hospital" => PlayerState::Hospital {
                location: parse_hospital_location(description),
            },
            "Traveling" => {
                if let Some(place) = description.strip_prefix("Returning to Torn from ") {
                    PlayerState::Traveling {
                        direction: TravelDirection::Returning,
                        place: place.trim().to_string(),
                    }
                } else if let Some(place) = description.strip_prefix("Traveling to ") {
                    PlayerState::Traveling {
                        direction: TravelDirection::Outbound,
                        place: place.trim().to_string(),
                    }
                } else {
                    PlayerState::Unknown
                }
            }
            "Abroad" => {
                let place = description
                    .strip_prefix("In ")
                    .unwrap_or(description)
                    .trim()
                    .to_string();
                PlayerState::Abroad { place }
            }
            _ => PlayerState::Unknown,
        }
    }

    /// Numeric order for the status sort column (0 = Okay .. 4 = Unknown).
    pub fn order(&self) -> u8 {
        match self {
            PlayerState::Okay => 0,
            PlayerState::Hospital { .. } => 1,
            PlayerState::Traveling { .. } => 2,
            PlayerState::Abroad { .. } => 3,
            PlayerState::Unknown => 4,
        }
    }

    pub fn is_okay(&self) -> bool {
        matches!(self, PlayerState::Okay)
    }
}

/// "In a Swiss hospital" -> Some("Swiss"). Plain "In hospital ..." -> None.
fn parse_hospital_location(description: &str) -> Option<String> {
    let inner = description.strip_prefix("In a ")?;
    let place = inner.strip_suffix(" hospital").or_else(|| {
        // "In a Swiss hospital for 2 hrs"
        inner.split(" hospital").next().filter(|p| *p != inner)
    })?;
    let place = place.trim();
    if place.is_empty() {
        None
    } else {
        Some(place.to_string())
    }
}

/// Full status of a player: tagged state, the source's free text, and the
/// hospital release time (epoch seconds) when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub description: String,
    pub until: Option<i64>,
}

impl PlayerStatus {
    /// Build a normalized status from the wire fields.
    pub fn normalized(state: &str, description: &str, until: Option<i64>) -> Self {
        Self {
            state: PlayerState::parse(state, description),
            description: description.to_string(),
            until: until.filter(|&u| u > 0),
        }
    }

    /// Short display text derived from the tagged state.
    pub fn display(&self) -> String {
        match &self.state {
            PlayerState::Okay => "Okay".to_string(),
            PlayerState::Hospital { .. } => {
                if self.description.is_empty() {
                    "In hospital".to_string()
                } else {
                    self.description.clone()
                }
            }
            PlayerState::Traveling { direction, place } => match direction {
                TravelDirection::Outbound => format!("Traveling to {}", place),
                TravelDirection::Returning => format!("Returning from {}", place),
            },
            PlayerState::Abroad { place } => format!("In {}", place),
            PlayerState::Unknown => {
                if self.description.is_empty() {
                    "Unknown".to_string()
                } else {
                    self.description.clone()
                }
            }
        }
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            state: PlayerState::Unknown,
            description: String::new(),
            until: None,
        }
    }
}

/// Battle-stat estimate attached to a player by the enrichment lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatEstimate {
    /// Human-readable label, e.g. "2.5m".
    pub label: String,
    /// Derived numeric value for sorting/filtering; None when unknown.
    pub total: Option<u64>,
}

impl StatEstimate {
    /// Placeholder used when enrichment is off or the id was not covered.
    pub fn placeholder() -> Self {
        Self {
            label: "unknown".to_string(),
            total: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.total.is_none() && self.label == "unknown"
    }
}

impl Default for StatEstimate {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// One row of a team roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: u64,
    pub name: String,
    pub level: u32,
    pub status: PlayerStatus,
    /// Relative last-action text from the source, e.g. "12 minutes ago".
    pub last_action: String,
    pub attacks: u32,
    pub score: i64,
    #[serde(default)]
    pub estimate: StatEstimate,
    /// Unprocessed source object, kept for the inspect overlay.
    /// Not persisted: dropped on serialization to bound storage size.
    #[serde(skip_serializing, default)]
    pub raw: Option<serde_json::Value>,
}

impl PlayerRecord {
    /// Seconds until hospital release relative to `now_epoch`, if any.
    pub fn hospital_remaining(&self, now_epoch: i64) -> Option<i64> {
        match self.status.state {
            PlayerState::Hospital { .. } => self.status.until.map(|u| u - now_epoch),
            _ => None,
        }
    }
}

/// Sortable columns of the roster table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSortColumn {
    Name,
    Level,
    Status,
    LastAction,
    Attacks,
    Score,
    Estimate,
}

impl PlayerSortColumn {
    pub fn next(&self) -> Self {
        match self {
            PlayerSortColumn::Name => PlayerSortColumn::Level,
            PlayerSortColumn::Level => PlayerSortColumn::Status,
            PlayerSortColumn::Status => PlayerSortColumn::LastAction,
            PlayerSortColumn::LastAction => PlayerSortColumn::Attacks,
            PlayerSortColumn::Attacks => PlayerSortColumn::Score,
            PlayerSortColumn::Score => PlayerSortColumn::Estimate,
            PlayerSortColumn::Estimate => PlayerSortColumn::Name,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PlayerSortColumn::Name => "Name",
            PlayerSortColumn::Level => "Lvl",
            PlayerSortColumn::Status => "Status",
            PlayerSortColumn::LastAction => "Last Action",
            PlayerSortColumn::Attacks => "Attacks",
            PlayerSortColumn::Score => "Score",
            PlayerSortColumn::Estimate => "Est",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_okay() {
        assert_eq!(PlayerState::parse("Okay", "Okay"), PlayerState::Okay);
    }

    #[test]
    fn test_parse_traveling_outbound() {
        assert_eq!(
            PlayerState::parse("Traveling", "Traveling to Switzerland"),
            PlayerState::Traveling {
                direction: TravelDirection::Outbound,
                place: "Switzerland".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_traveling_returning() {
        assert_eq!(
            PlayerState::parse("Traveling", "Returning to Torn from Mexico"),
            PlayerState::Traveling {
                direction: TravelDirection::Returning,
                place: "Mexico".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_abroad() {
        assert_eq!(
            PlayerState::parse("Abroad", "In Japan"),
            PlayerState::Abroad {
                place: "Japan".to_string()
            }
        );
    }

    #[test]
    fn test_parse_hospital_home_and_abroad() {
        assert_eq!(
            PlayerState::parse("Hospital", "In hospital for 2 mins"),
            PlayerState::Hospital { location: None }
        );
        assert_eq!(
            PlayerState::parse("Hospital", "In a Swiss hospital"),
            PlayerState::Hospital {
                location: Some("Swiss".to_string())
            }
        );
        assert_eq!(
            PlayerState::parse("Hospital", "In a British hospital for 41 mins"),
            PlayerState::Hospital {
                location: Some("British".to_string())
            }
        );
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(PlayerState::parse("Jail", "In jail"), PlayerState::Unknown);
        assert_eq!(
            PlayerState::parse("Traveling", "Somewhere odd"),
            PlayerState::Unknown
        );
    }

    #[test]
    fn test_display_strings() {
        let status = PlayerStatus::normalized("Traveling", "Returning to Torn from Mexico", None);
        assert_eq!(status.display(), "Returning from Mexico");

        let status = PlayerStatus::normalized("Traveling", "Traveling to Hawaii", None);
        assert_eq!(status.display(), "Traveling to Hawaii");

        let status = PlayerStatus::normalized("Abroad", "In Japan", None);
        assert_eq!(status.display(), "In Japan");
    }

    #[test]
    fn test_until_zero_is_none() {
        let status = PlayerStatus::normalized("Okay", "Okay", Some(0));
        assert_eq!(status.until, None);
    }

    #[test]
    fn test_estimate_placeholder() {
        let est = StatEstimate::default();
        assert!(est.is_placeholder());
        assert_eq!(est.label, "unknown");
    }

    #[test]
    fn test_raw_not_serialized() {
        let record = PlayerRecord {
            id: 1,
            name: "Tester".to_string(),
            level: 10,
            status: PlayerStatus::normalized("Okay", "Okay", None),
            last_action: "5 minutes ago".to_string(),
            attacks: 3,
            score: 150,
            estimate: StatEstimate::default(),
            raw: Some(serde_json::json!({"id": 1})),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("raw"));

        let back: PlayerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.raw, None);
        assert_eq!(back.name, record.name);
    }
}
