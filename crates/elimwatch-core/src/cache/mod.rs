//! Cache coordination: freshness policy, in-flight session sharing, and
//! persistence for the dashboard's two cached resources.

pub mod coordinator;
pub mod entry;
pub mod poller;

pub use coordinator::{
    Coordinator, Metadata, MetadataSnapshot, RefreshEvent, RefreshOutcome, RosterSnapshot,
};
pub use entry::{CachedData, META_REFRESH_SECS, MIN_FETCH_SECS, TEAM_REFRESH_SECS};
pub use poller::RefreshScheduler;
