//! Supabase backend
//!
//! - [`protocol`]: Realtime (Phoenix v1) frame encoding, runtime-free
//! - [`rest`]: PostgREST bulk read, implements [`TicketSource`](crate::sync::TicketSource)
//! - [`realtime`]: WebSocket change feed, implements [`ChangeFeed`](crate::sync::ChangeFeed)

pub mod protocol;

#[cfg(feature = "native")]
mod error;
#[cfg(feature = "native")]
pub mod realtime;
#[cfg(feature = "native")]
pub mod rest;

pub use protocol::{Inbound, PhoenixMessage, ProtocolError, TableRef};

#[cfg(feature = "native")]
pub use error::{RealtimeError, RealtimeResult, SupabaseError, SupabaseResult};
#[cfg(feature = "native")]
pub use realtime::{RealtimeClient, RealtimeSettings};
#[cfg(feature = "native")]
pub use rest::SupabaseRest;
