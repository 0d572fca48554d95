//! Per-tab rendering.

pub mod roster;
pub mod teams;
