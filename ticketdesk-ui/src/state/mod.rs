//! State Management
//!
//! Global dashboard state and the Realtime subscription.

pub mod global;
pub mod realtime;

pub use global::{provide_global_state, GlobalState};
pub use realtime::{RealtimeChannel, SubscriptionSlot};
