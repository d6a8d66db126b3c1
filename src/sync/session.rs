//! Sync session
//!
//! Runs the data-sync lifecycle in one tokio task:
//!
//! 1. `loading = true`, bulk read, replace the list (or log the failure),
//!    `loading = false` whatever the outcome;
//! 2. open the change subscription;
//! 3. apply events one at a time, in arrival order.
//!
//! The task is the only writer of [`SyncState`]; observers get it through a
//! `watch` channel and re-render on every published version.
//!
//! Teardown is two-phase. Subscription setup is asynchronous, so
//! [`SyncHandle::shutdown`] first waits for setup to resolve and only then
//! closes the subscription it produced. Nothing is closed before it exists
//! and nothing is left open.

use crate::sync::event::ChangeEvent;
use crate::sync::mirror::{Applied, TicketMirror};
use crate::sync::source::{ChangeFeed, SubscriptionHandle, TicketSource};
use crate::view::DashboardStats;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Observable state of a sync session
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub tickets: TicketMirror,
    /// True until the initial bulk read has resolved
    pub loading: bool,
    /// True while a change subscription is delivering events
    pub live: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            tickets: TicketMirror::new(),
            loading: true,
            live: false,
        }
    }
}

impl SyncState {
    pub fn stats(&self) -> DashboardStats {
        self.tickets.stats()
    }
}

/// How teardown went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The subscription was open and has been closed
    Closed,
    /// Setup never produced a subscription (subscribe failed)
    NoSubscription,
}

/// Data-sync component over a bulk-read source and a change feed
pub struct TicketSync<S, F> {
    source: S,
    feed: F,
}

impl<S, F> TicketSync<S, F>
where
    S: TicketSource + 'static,
    F: ChangeFeed + 'static,
{
    pub fn new(source: S, feed: F) -> Self {
        Self { source, feed }
    }

    /// Spawn the session task and return its handle
    pub fn start(self) -> SyncHandle {
        let (state_tx, state_rx) = watch::channel(SyncState::default());
        let (handle_tx, handle_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            self.run(state_tx, handle_tx).await;
        });

        SyncHandle {
            state: state_rx,
            pending: handle_rx,
            task,
        }
    }

    async fn run(
        self,
        state_tx: watch::Sender<SyncState>,
        handle_tx: oneshot::Sender<SubscriptionHandle>,
    ) {
        state_tx.send_modify(|state| state.loading = true);

        match self.source.fetch_all().await {
            Ok(tickets) => {
                tracing::info!(count = tickets.len(), "Fetched tickets");
                state_tx.send_modify(|state| {
                    state.tickets.replace(tickets);
                    state.loading = false;
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching tickets");
                state_tx.send_modify(|state| state.loading = false);
            }
        }

        let subscription = match self.feed.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                // Dropping handle_tx tells teardown there is nothing to close
                tracing::error!(error = %e, "Failed to subscribe to ticket changes");
                return;
            }
        };

        let (events, handle) = subscription.into_parts();
        if let Err(handle) = handle_tx.send(handle) {
            // The session handle is gone; nobody will ever tear us down
            tracing::debug!("Session dropped during setup, closing subscription");
            handle.close().await;
            return;
        }

        state_tx.send_modify(|state| state.live = true);
        tracing::info!("Subscribed to ticket changes");

        apply_events(events, &state_tx).await;

        state_tx.send_modify(|state| state.live = false);
        tracing::info!("Ticket change stream ended");
    }
}

/// Drain the event stream into the published state, one event at a time
async fn apply_events(
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    state_tx: &watch::Sender<SyncState>,
) {
    while let Some(event) = events.recv().await {
        let kind = event.kind();
        let ticket_id = event.ticket_id().clone();
        let mut applied = Applied::Ignored;

        state_tx.send_if_modified(|state| {
            applied = state.tickets.apply(event);
            applied.changed()
        });

        tracing::debug!(event = %kind, ticket_id = %ticket_id, ?applied, "Change received");
    }
}

/// Handle to a running sync session
pub struct SyncHandle {
    state: watch::Receiver<SyncState>,
    pending: oneshot::Receiver<SubscriptionHandle>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// A fresh receiver for state updates
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Wait for the next published state. Returns false once the session
    /// task has finished and no more updates will come.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Tear the session down
    ///
    /// Waits for subscription setup to resolve, closes the subscription if
    /// one was opened, then waits for the session task to drain.
    pub async fn shutdown(self) -> Teardown {
        let SyncHandle { pending, task, .. } = self;

        let teardown = match pending.await {
            Ok(handle) => {
                handle.close().await;
                Teardown::Closed
            }
            Err(_) => Teardown::NoSubscription,
        };

        if let Err(e) = task.await {
            tracing::error!(error = %e, "Sync task failed");
        }

        tracing::info!(?teardown, "Sync session stopped");
        teardown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::source::Subscription;
    use crate::ticket::{Ticket, TicketId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct FakeError;

    struct FakeSource {
        result: Mutex<Option<Result<Vec<Ticket>, FakeError>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeSource {
        fn ok(tickets: Vec<Ticket>) -> Self {
            Self {
                result: Mutex::new(Some(Ok(tickets))),
                gate: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                result: Mutex::new(Some(Err(FakeError))),
                gate: Mutex::new(None),
            }
        }

        fn gated(mut self, gate: oneshot::Receiver<()>) -> Self {
            self.gate = Mutex::new(Some(gate));
            self
        }
    }

    #[async_trait]
    impl TicketSource for FakeSource {
        type Error = FakeError;

        async fn fetch_all(&self) -> Result<Vec<Ticket>, FakeError> {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.result.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct Counters {
        subscribes: AtomicUsize,
        /// Explicit closes through the handle
        closes: AtomicUsize,
        /// Transports released by dropping the handle
        released: AtomicUsize,
    }

    struct FakeFeed {
        events: Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        fail: bool,
        counters: Arc<Counters>,
    }

    impl FakeFeed {
        fn new(events: mpsc::UnboundedReceiver<ChangeEvent>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let feed = Self {
                events: Mutex::new(Some(events)),
                gate: Mutex::new(None),
                fail: false,
                counters: Arc::clone(&counters),
            };
            (feed, counters)
        }

        fn gated(mut self, gate: oneshot::Receiver<()>) -> Self {
            self.gate = Mutex::new(Some(gate));
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl ChangeFeed for FakeFeed {
        type Error = FakeError;

        async fn subscribe(&self) -> Result<Subscription, FakeError> {
            self.counters.subscribes.fetch_add(1, Ordering::SeqCst);

            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail {
                return Err(FakeError);
            }

            let mut upstream = self
                .events
                .lock()
                .unwrap()
                .take()
                .expect("subscribe called twice");
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let (close_tx, close_rx) = oneshot::channel::<()>();
            let counters = Arc::clone(&self.counters);

            let task = tokio::spawn(async move {
                let forward = async {
                    while let Some(event) = upstream.recv().await {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    // Keep the stream open until closed
                    std::future::pending::<()>().await;
                };
                tokio::select! {
                    signal = close_rx => {
                        if signal.is_ok() {
                            counters.closes.fetch_add(1, Ordering::SeqCst);
                        } else {
                            counters.released.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    _ = forward => {}
                }
            });

            Ok(Subscription::new(events_rx, SubscriptionHandle::new(close_tx, task)))
        }
    }

    fn ticket(id: &str) -> Ticket {
        Ticket::new(id, "2024-05-01T10:00:00Z", format!("ticket {}", id))
    }

    async fn wait_until(handle: &SyncHandle, pred: impl FnMut(&SyncState) -> bool) -> SyncState {
        let mut rx = handle.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .expect("timed out waiting for state")
            .expect("session ended");
        state.clone()
    }

    #[tokio::test]
    async fn test_fetch_then_update() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, counters) = FakeFeed::new(events_rx);
        let handle = TicketSync::new(FakeSource::ok(vec![ticket("a")]), feed).start();

        wait_until(&handle, |s| s.live).await;

        events_tx
            .send(ChangeEvent::Update(ticket("a").processed(true).sentiment("Positivo")))
            .unwrap();

        let state = wait_until(&handle, |s| s.tickets.tickets().iter().any(|t| t.processed)).await;
        assert_eq!(state.tickets.len(), 1);
        let a = state.tickets.get(&TicketId::new("a")).unwrap();
        assert_eq!(a.sentiment.as_deref(), Some("Positivo"));
        assert!(!state.loading);

        assert_eq!(handle.shutdown().await, Teardown::Closed);
        assert_eq!(counters.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_into_empty_fetch() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, _counters) = FakeFeed::new(events_rx);
        let handle = TicketSync::new(FakeSource::ok(Vec::new()), feed).start();

        wait_until(&handle, |s| s.live).await;
        events_tx.send(ChangeEvent::Insert(ticket("b"))).unwrap();

        let state = wait_until(&handle, |s| !s.tickets.is_empty()).await;
        let ids: Vec<_> = state.tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_apply_in_arrival_order() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, _counters) = FakeFeed::new(events_rx);
        let handle = TicketSync::new(FakeSource::ok(vec![ticket("x"), ticket("y")]), feed).start();

        // Sent before the subscription is confirmed; delivered once it is
        events_tx.send(ChangeEvent::Delete(TicketId::new("x"))).unwrap();
        events_tx.send(ChangeEvent::Insert(ticket("z"))).unwrap();
        events_tx.send(ChangeEvent::Update(ticket("z").category("Comercial"))).unwrap();
        events_tx.send(ChangeEvent::Delete(TicketId::new("missing"))).unwrap();

        let state = wait_until(&handle, |s| {
            s.tickets
                .get(&TicketId::new("z"))
                .map_or(false, |t| t.category.is_some())
        })
        .await;
        let ids: Vec<_> = state.tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "y"]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_fetch_failure_clears_loading() {
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, counters) = FakeFeed::new(events_rx);
        let (release_tx, release_rx) = oneshot::channel();
        let source = FakeSource::failing().gated(release_rx);
        let handle = TicketSync::new(source, feed).start();

        assert!(handle.snapshot().loading);

        release_tx.send(()).unwrap();
        let state = wait_until(&handle, |s| !s.loading).await;
        assert!(state.tickets.is_empty());

        // Subscription still opens after a failed read
        wait_until(&handle, |s| s.live).await;
        assert_eq!(counters.subscribes.load(Ordering::SeqCst), 1);

        assert_eq!(handle.shutdown().await, Teardown::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_pending_setup() {
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, counters) = FakeFeed::new(events_rx);
        let (release_tx, release_rx) = oneshot::channel();
        let handle = TicketSync::new(FakeSource::ok(vec![ticket("a")]), feed.gated(release_rx)).start();

        wait_until(&handle, |s| !s.loading).await;

        let shutdown = tokio::spawn(handle.shutdown());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!shutdown.is_finished(), "teardown must wait for setup");
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        let teardown = tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(teardown, Teardown::Closed);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_after_failed_subscribe() {
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, counters) = FakeFeed::new(events_rx);
        let handle = TicketSync::new(FakeSource::ok(vec![ticket("a")]), feed.failing()).start();

        assert_eq!(handle.shutdown().await, Teardown::NoSubscription);
        assert_eq!(counters.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_handle_closes_subscription() {
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed, counters) = FakeFeed::new(events_rx);
        let (release_tx, release_rx) = oneshot::channel();
        let handle = TicketSync::new(FakeSource::ok(Vec::new()), feed.gated(release_rx)).start();

        drop(handle);
        release_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while counters.closes.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription was never closed");
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }
}
