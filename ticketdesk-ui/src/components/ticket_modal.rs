//! Ticket Detail Modal

use leptos::*;
use ticketdesk::view::badge;
use ticketdesk::Ticket;

use super::ticket_card::BadgePill;
use crate::state::global::GlobalState;

/// Detail view of the selected ticket, if any
#[component]
pub fn TicketModal() -> impl IntoView {
    let state = use_context::<GlobalState>().expect("GlobalState not found");

    move || {
        state
            .selection
            .with(|selection| selection.selected().cloned())
            .map(|ticket| view! { <TicketDetail ticket=ticket /> })
    }
}

#[component]
fn TicketDetail(ticket: Ticket) -> impl IntoView {
    let state = use_context::<GlobalState>().expect("GlobalState not found");
    let created = ticket
        .created_at_utc()
        .map(|dt| dt.format("%d/%m/%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| ticket.created_at.clone());
    let status = if ticket.processed { "Procesado" } else { "Pendiente" };

    view! {
        <div
            class="fixed inset-0 bg-black/50 flex items-center justify-center p-4 z-50"
            on:click=move |_| state.close_detail()
        >
            <div
                class="bg-white rounded-xl shadow-xl max-w-2xl w-full p-6"
                on:click=|ev| ev.stop_propagation()
            >
                <div class="flex items-start justify-between">
                    <div>
                        <h2 class="text-xl font-bold text-gray-900">"Detalle del Ticket"</h2>
                        <p class="text-xs text-gray-500 font-mono mt-1">{ticket.id.to_string()}</p>
                    </div>
                    <button
                        class="text-gray-400 hover:text-gray-600 text-2xl leading-none"
                        on:click=move |_| state.close_detail()
                    >
                        "×"
                    </button>
                </div>

                <dl class="mt-4 grid grid-cols-2 gap-4 text-sm">
                    <div>
                        <dt class="text-gray-500">"Fecha de creación"</dt>
                        <dd class="text-gray-900">{created}</dd>
                    </div>
                    <div>
                        <dt class="text-gray-500">"Estado"</dt>
                        <dd class="text-gray-900">{status}</dd>
                    </div>
                    <div>
                        <dt class="text-gray-500">"Categoría"</dt>
                        <dd><BadgePill badge=badge::category_badge(&ticket) /></dd>
                    </div>
                    <div>
                        <dt class="text-gray-500">"Sentimiento"</dt>
                        <dd><BadgePill badge=badge::sentiment_badge(&ticket) /></dd>
                    </div>
                </dl>

                <div class="mt-4">
                    <h3 class="text-sm text-gray-500">"Descripción"</h3>
                    <p class="mt-1 text-gray-800 whitespace-pre-wrap">{ticket.description.clone()}</p>
                </div>
            </div>
        </div>
    }
}
