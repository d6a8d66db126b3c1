//! Presentation model
//!
//! Everything a renderer needs that is derived from the synced ticket list:
//! aggregate counts, badge tones and labels, and the detail-view selection.
//! Nothing here writes back to the mirror.
//!
//! - [`stats`]: total / processed / negative / pending counts
//! - [`badge`]: category and sentiment display treatments
//! - [`state`]: selected-ticket state
//! - [`render`]: plain-text renderer used by the CLI

pub mod badge;
pub mod render;
pub mod state;
pub mod stats;

pub use badge::{Badge, Tone};
pub use state::Selection;
pub use stats::DashboardStats;
