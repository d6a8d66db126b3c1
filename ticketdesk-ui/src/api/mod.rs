//! Supabase API access

pub mod client;

pub use client::{fetch_tickets, supabase_settings, SupabaseSettings};
