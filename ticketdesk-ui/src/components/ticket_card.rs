//! Ticket Cards
//!
//! Newest-first ticket list. Clicking a card opens the detail view.

use leptos::*;
use ticketdesk::view::badge;
use ticketdesk::view::render::EMPTY;
use ticketdesk::{Badge, Ticket};

use super::tone_class;
use crate::state::global::GlobalState;

#[component]
pub fn BadgePill(badge: Badge) -> impl IntoView {
    view! {
        <span class=format!("px-2 py-1 rounded-full text-xs font-medium {}", tone_class(badge.tone))>
            {badge.label}
        </span>
    }
}

#[component]
pub fn TicketCard(ticket: Ticket) -> impl IntoView {
    let state = use_context::<GlobalState>().expect("GlobalState not found");
    let category = badge::category_badge(&ticket);
    let sentiment = badge::sentiment_badge(&ticket);
    let processed = badge::processed_badge(&ticket);
    let short_id = format!("#{}...", ticket.short_id());
    let created = ticket.created_date();
    let description = ticket.description.clone();

    view! {
        <div
            class="bg-white rounded-lg shadow p-4 border border-gray-200 hover:shadow-md transition cursor-pointer"
            on:click=move |_| state.open(&ticket)
        >
            <div class="flex items-center justify-between text-xs text-gray-500">
                <span class="font-mono">{short_id}</span>
                <span>{created}</span>
            </div>
            <p class="mt-2 text-gray-800 line-clamp-2">{description}</p>
            <div class="mt-3 flex flex-wrap gap-2">
                <BadgePill badge=category />
                <BadgePill badge=sentiment />
                {processed.map(|badge| view! { <BadgePill badge=badge /> })}
            </div>
        </div>
    }
}

#[component]
pub fn TicketList() -> impl IntoView {
    let state = use_context::<GlobalState>().expect("GlobalState not found");

    view! {
        {move || {
            let tickets = state.tickets.with(|mirror| mirror.tickets().to_vec());
            if tickets.is_empty() {
                view! { <div class="text-center text-gray-500 py-12">{EMPTY}</div> }.into_view()
            } else {
                view! {
                    <div class="grid gap-4">
                        {tickets
                            .into_iter()
                            .map(|ticket| view! { <TicketCard ticket=ticket /> })
                            .collect_view()}
                    </div>
                }
                .into_view()
            }
        }}
    }
}
