//! Backend seams of the sync session
//!
//! [`TicketSource`] is the bulk read, [`ChangeFeed`] the live subscription.
//! A subscription is a two-part resource: the event receiver the session
//! drains, and a [`SubscriptionHandle`] that closes the underlying transport.

use crate::sync::event::ChangeEvent;
use crate::ticket::Ticket;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One-shot read of the whole ticket collection, newest first
#[async_trait]
pub trait TicketSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch_all(&self) -> Result<Vec<Ticket>, Self::Error>;
}

/// Live insert/update/delete notifications for the ticket collection
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a subscription. Resolves once the backend has confirmed it.
    async fn subscribe(&self) -> Result<Subscription, Self::Error>;
}

/// An open change subscription
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>, handle: SubscriptionHandle) -> Self {
        Self { events, handle }
    }

    /// Split into the event stream and the close handle
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<ChangeEvent>, SubscriptionHandle) {
        (self.events, self.handle)
    }
}

/// Closes a subscription's transport
///
/// `close` consumes the handle, so a subscription is closed at most once.
/// Dropping the handle also releases the transport: the transport task sees
/// the close channel hang up and shuts down on its own.
pub struct SubscriptionHandle {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// `close_tx` signals the transport task; `task` is awaited on close
    pub fn new(close_tx: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self { close_tx, task }
    }

    /// Signal the transport to close and wait until it has
    pub async fn close(self) {
        // The task may already be gone if the transport gave up
        let _ = self.close_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Subscription transport task failed");
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
