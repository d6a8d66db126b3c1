//! Aggregate counts shown above the ticket list
//!
//! Recomputed from the list on every render; there are no running counters to
//! drift out of sync with the mirror.

use crate::ticket::Ticket;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub processed: usize,
    /// Tickets whose sentiment is `Negativo`
    pub negative: usize,
    /// Tickets still waiting for analysis
    pub pending: usize,
}

impl DashboardStats {
    pub fn from_tickets<'a, I>(tickets: I) -> Self
    where
        I: IntoIterator<Item = &'a Ticket>,
    {
        tickets
            .into_iter()
            .fold(Self::default(), |mut stats, ticket| {
                stats.total += 1;
                if ticket.processed {
                    stats.processed += 1;
                } else {
                    stats.pending += 1;
                }
                if ticket.is_negative() {
                    stats.negative += 1;
                }
                stats
            })
    }

    /// Label/value pairs in display order
    pub fn cards(&self) -> [(&'static str, usize); 4] {
        [
            ("Total Tickets", self.total),
            ("Procesados", self.processed),
            ("Negativos", self.negative),
            ("Pendientes", self.pending),
        ]
    }
}
