//! Data models for the elimination dashboard.
//!
//! - `AccountProfile`: the authenticated user
//! - `TeamSummary`: one standings row, replaced wholesale per refresh
//! - `PlayerRecord`: one roster row with normalized status and optional
//!   battle-stat estimate
//! - `PlayerState`: tagged activity state, parsed once at ingestion

pub mod player;
pub mod profile;
pub mod team;

pub use player::{
    PlayerRecord, PlayerSortColumn, PlayerState, PlayerStatus, StatEstimate, TravelDirection,
};
pub use profile::AccountProfile;
pub use team::{TeamSortColumn, TeamSummary};
