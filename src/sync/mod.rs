//! Data sync
//!
//! Keeps a local mirror of the remote ticket table: one bulk read, then a
//! stream of insert/update/delete events applied in arrival order.
//!
//! [`event`] and [`mirror`] are runtime-free and also back the browser
//! dashboard. [`source`] and [`session`] drive them on tokio.

pub mod event;
pub mod mirror;

#[cfg(feature = "native")]
pub mod session;
#[cfg(feature = "native")]
pub mod source;

pub use event::{ChangeEvent, ChangeKind};
pub use mirror::{Applied, TicketMirror};

#[cfg(feature = "native")]
pub use session::{SyncHandle, SyncState, Teardown, TicketSync};
#[cfg(feature = "native")]
pub use source::{ChangeFeed, Subscription, SubscriptionHandle, TicketSource};
