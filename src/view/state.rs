//! View-local state
//!
//! The only state presentation owns besides what it reads from the sync
//! session: which ticket (if any) is open in the detail view.

use crate::ticket::{Ticket, TicketId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    selected: Option<Ticket>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the detail view for a ticket. The view keeps the snapshot it was
    /// opened with; later changes show up once it is reopened.
    pub fn open(&mut self, ticket: &Ticket) {
        self.selected = Some(ticket.clone());
    }

    /// Open by id from a list; returns false if the id is not in the list
    pub fn open_id(&mut self, tickets: &[Ticket], id: &TicketId) -> bool {
        match tickets.iter().find(|t| &t.id == id) {
            Some(ticket) => {
                self.open(ticket);
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Ticket> {
        self.selected.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }
}
