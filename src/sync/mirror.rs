//! Ticket mirror
//!
//! Local, newest-first copy of the remote ticket collection. The mirror is a
//! read-through cache: it changes only by replacing the whole list with a bulk
//! read or by applying change events in arrival order.
//!
//! Invariant: at most one entry per [`TicketId`], holding the last version
//! observed for that id.

use crate::sync::event::ChangeEvent;
use crate::ticket::{Ticket, TicketId};
use crate::view::DashboardStats;
use std::collections::HashSet;

/// Outcome of applying one change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    /// An insert whose id was already present; the stale entry was dropped
    Reinserted,
    Updated,
    Deleted,
    /// Update or delete for an id the mirror does not hold
    Ignored,
}

impl Applied {
    /// Whether the list changed
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Ignored)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketMirror {
    tickets: Vec<Ticket>,
}

impl TicketMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mirror from a bulk read (already ordered newest first)
    pub fn from_snapshot(tickets: Vec<Ticket>) -> Self {
        let mut mirror = Self::new();
        mirror.replace(tickets);
        mirror
    }

    /// Replace the whole list with a bulk read result
    ///
    /// Order is kept as delivered. Should the read contain an id twice, the
    /// first (newest) row wins.
    pub fn replace(&mut self, tickets: Vec<Ticket>) {
        let mut seen = HashSet::with_capacity(tickets.len());
        self.tickets = tickets
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
    }

    /// Apply one change event
    pub fn apply(&mut self, event: ChangeEvent) -> Applied {
        match event {
            ChangeEvent::Insert(ticket) => {
                // No re-sort: inserts arrive in creation order, so the front
                // stays the newest ticket.
                let applied = match self.position(&ticket.id) {
                    Some(idx) => {
                        self.tickets.remove(idx);
                        Applied::Reinserted
                    }
                    None => Applied::Inserted,
                };
                self.tickets.insert(0, ticket);
                applied
            }
            ChangeEvent::Update(ticket) => match self.position(&ticket.id) {
                Some(idx) => {
                    self.tickets[idx] = ticket;
                    Applied::Updated
                }
                None => Applied::Ignored,
            },
            ChangeEvent::Delete(id) => match self.position(&id) {
                Some(idx) => {
                    self.tickets.remove(idx);
                    Applied::Deleted
                }
                None => Applied::Ignored,
            },
        }
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn get(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.iter().find(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ticket> {
        self.tickets.iter()
    }

    /// Aggregate counts over the current list
    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_tickets(&self.tickets)
    }

    fn position(&self, id: &TicketId) -> Option<usize> {
        self.tickets.iter().position(|t| &t.id == id)
    }
}

impl<'a> IntoIterator for &'a TicketMirror {
    type Item = &'a Ticket;
    type IntoIter = std::slice::Iter<'a, Ticket>;

    fn into_iter(self) -> Self::IntoIter {
        self.tickets.iter()
    }
}
