//! Core engine for the elimination dashboard.
//!
//! The centerpiece is [`cache::Coordinator`]: it owns the two cached
//! resources (metadata and per-team rosters), decides when the API may be
//! hit, shares in-flight refresh sessions between callers, and keeps the
//! persistent store in step with memory. Front ends talk to the coordinator
//! and never to the API clients directly.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod store;
pub mod utils;
