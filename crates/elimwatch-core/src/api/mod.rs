//! Clients for the remote services behind the dashboard.
//!
//! `TornClient` speaks to the Torn public API, `StatsClient` to the optional
//! battle-stats service. The coordinator consumes both through the
//! `DataSource` trait so tests can substitute a scripted source.

mod error;
mod source;
mod stats;
mod torn;

pub use error::ApiError;
pub use source::{DataSource, LiveDataSource};
pub use stats::{key_check_verdict, normalize_estimate, StatsClient};
pub use torn::{TornClient, ROSTER_PAGE_SIZE};
