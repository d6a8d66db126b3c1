//! Ticketdesk Dashboard
//!
//! Live support-ticket dashboard built with Leptos (WASM).
//!
//! # Features
//!
//! - Ticket list, newest first, with category and sentiment badges
//! - Total / processed / negative / pending counters
//! - Detail view for a single ticket
//! - Live updates over Supabase Realtime
//!
//! # Architecture
//!
//! Client-side rendered (CSR) Leptos application compiled to WebAssembly.
//! It reads the ticket table from PostgREST once and then follows the
//! Realtime change feed, applying each change to the shared `TicketMirror`.

use leptos::*;

mod api;
mod app;
mod components;
mod state;

fn main() {
    // Set up panic hook for better error messages in WASM
    console_error_panic_hook::set_once();

    mount_to_body(|| view! { <app::App /> });
}
