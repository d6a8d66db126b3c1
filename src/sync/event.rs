//! Change events
//!
//! One variant per row operation reported by the change feed. Deletes only
//! carry the key, since the old row image normally holds just the primary key.

use crate::ticket::{Ticket, TicketId};
use std::fmt;

/// A row change on the ticket collection
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A new ticket was created
    Insert(Ticket),
    /// An existing ticket changed; carries the new row
    Update(Ticket),
    /// A ticket was removed; carries the id of the old row
    Delete(TicketId),
}

/// Event-type tag, as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Parse the `type`/`eventType` tag (`INSERT`, `UPDATE`, `DELETE`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete(_) => ChangeKind::Delete,
        }
    }

    /// Id of the affected ticket
    pub fn ticket_id(&self) -> &TicketId {
        match self {
            Self::Insert(ticket) | Self::Update(ticket) => &ticket.id,
            Self::Delete(id) => id,
        }
    }
}
