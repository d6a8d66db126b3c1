//! Global Application State
//!
//! Reactive state management using Leptos signals. The ticket mirror is the
//! single source of truth; counters and badges are derived from it on read.

use leptos::*;
use ticketdesk::sync::{Applied, ChangeEvent, TicketMirror};
use ticketdesk::{DashboardStats, Selection, Ticket};

/// Global application state provided to all components
#[derive(Clone, Copy)]
pub struct GlobalState {
    /// Mirror of the remote ticket table
    pub tickets: RwSignal<TicketMirror>,
    /// True until the initial read has resolved
    pub loading: RwSignal<bool>,
    /// Ticket open in the detail view
    pub selection: RwSignal<Selection>,
    /// Realtime channel joined
    pub live: RwSignal<bool>,
    /// Error message to display
    pub error: RwSignal<Option<String>>,
}

/// Provide global state to the component tree
pub fn provide_global_state() -> GlobalState {
    let state = GlobalState {
        tickets: create_rw_signal(TicketMirror::new()),
        loading: create_rw_signal(true),
        selection: create_rw_signal(Selection::new()),
        live: create_rw_signal(false),
        error: create_rw_signal(None),
    };

    provide_context(state);
    state
}

impl GlobalState {
    pub fn stats(&self) -> DashboardStats {
        self.tickets.with(TicketMirror::stats)
    }

    /// Replace the list with a fresh read
    pub fn set_tickets(&self, tickets: Vec<Ticket>) {
        self.tickets.update(|mirror| mirror.replace(tickets));
    }

    /// Apply one change from the feed
    pub fn apply(&self, event: ChangeEvent) -> Applied {
        let mut applied = Applied::Ignored;
        self.tickets.update(|mirror| applied = mirror.apply(event));
        applied
    }

    pub fn open(&self, ticket: &Ticket) {
        self.selection.update(|selection| selection.open(ticket));
    }

    pub fn close_detail(&self) {
        self.selection.update(Selection::close);
    }

    /// Show an error message (auto-clears after timeout)
    pub fn show_error(&self, message: &str) {
        self.error.set(Some(message.to_string()));

        let error_signal = self.error;
        gloo_timers::callback::Timeout::new(5000, move || {
            error_signal.set(None);
        })
        .forget();
    }
}
