//! UI Components
//!
//! Reusable Leptos components for the dashboard.

pub mod loading;
pub mod stat_card;
pub mod ticket_card;
pub mod ticket_modal;

pub use loading::Loading;
pub use stat_card::StatsGrid;
pub use ticket_card::TicketList;
pub use ticket_modal::TicketModal;

use ticketdesk::Tone;

/// Tailwind classes for a badge tone
pub fn tone_class(tone: Tone) -> &'static str {
    match tone {
        Tone::Green => "bg-green-100 text-green-800",
        Tone::Red => "bg-red-100 text-red-800",
        Tone::Gray => "bg-gray-100 text-gray-800",
        Tone::Blue => "bg-blue-100 text-blue-800",
        Tone::Purple => "bg-purple-100 text-purple-800",
        Tone::Yellow => "bg-yellow-100 text-yellow-800",
        Tone::Muted => "bg-gray-100 text-gray-500",
    }
}
