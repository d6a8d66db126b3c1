//! # Ticketdesk
//!
//! Live support-ticket dashboard - keeps a local mirror of a Supabase ticket
//! table in sync through one bulk read plus the Realtime change feed, and
//! derives the dashboard's counts and badges from it.
//!
//! ## Modules
//!
//! - [`ticket`]: ticket record and its category/sentiment labels
//! - [`sync`]: change events, the mirror, and the sync session
//! - [`view`]: stats, badges, selection and text rendering
//! - [`supabase`]: PostgREST reads and the Realtime client
//! - [`config`]: TOML config with environment overrides
//!
//! Without the default `native` feature only the runtime-free parts build
//! (`ticket`, `view`, the mirror and the Realtime wire protocol), which is
//! what the browser dashboard uses.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ticketdesk::config::Config;
//! use ticketdesk::supabase::{RealtimeClient, RealtimeSettings, SupabaseRest};
//! use ticketdesk::sync::TicketSync;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, _) = Config::load_default();
//!     let rest = SupabaseRest::new(&config.supabase)?;
//!     let feed = RealtimeClient::new(RealtimeSettings::from_config(
//!         &config.supabase,
//!         &config.realtime,
//!     )?);
//!
//!     let mut session = TicketSync::new(rest, feed).start();
//!     while session.changed().await {
//!         let state = session.snapshot();
//!         println!("{} tickets, {} pending", state.tickets.len(), state.stats().pending);
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod config;
pub mod supabase;
pub mod sync;
pub mod ticket;
pub mod view;

pub use sync::{ChangeEvent, ChangeKind, TicketMirror};
pub use ticket::{Category, Sentiment, Ticket, TicketId};
pub use view::{Badge, DashboardStats, Selection, Tone};
