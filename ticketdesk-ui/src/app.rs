//! App Root Component
//!
//! Provides global state, runs the initial read, then subscribes to
//! Realtime. The subscription is released when the app is torn down.

use leptos::*;
use ticketdesk::view::render::TITLE;

use crate::api;
use crate::components::{Loading, StatsGrid, TicketList, TicketModal};
use crate::state::global::provide_global_state;
use crate::state::realtime::{init_realtime, RealtimeChannel, SubscriptionSlot};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    let state = provide_global_state();
    let subscription: SubscriptionSlot<RealtimeChannel> = SubscriptionSlot::default();

    // Initial read, then subscribe
    let slot = subscription.clone();
    spawn_local(async move {
        let settings = api::supabase_settings();
        state.loading.set(true);

        match api::fetch_tickets(&settings).await {
            Ok(tickets) => {
                web_sys::console::log_1(&format!("Fetched {} tickets", tickets.len()).into());
                state.set_tickets(tickets);
            }
            Err(e) => {
                web_sys::console::error_1(&format!("Error fetching tickets: {}", e).into());
            }
        }

        state.loading.set(false);
        init_realtime(state, settings, slot);
    });

    on_cleanup(move || subscription.release());

    view! {
        <div class="min-h-screen bg-gray-50">
            <header class="bg-white shadow-sm">
                <div class="container mx-auto px-4 py-4 flex items-center justify-between">
                    <h1 class="text-2xl font-bold text-gray-900">{TITLE}</h1>
                    <LiveIndicator />
                </div>
            </header>

            <main class="container mx-auto px-4 py-8 space-y-8">
                <StatsGrid />

                {move || state.error.get().map(|message| view! {
                    <div class="bg-red-50 border border-red-200 text-red-700 rounded-lg p-3 text-sm">
                        {message}
                    </div>
                })}

                <section>
                    {move || {
                        if state.loading.get() {
                            view! { <Loading /> }.into_view()
                        } else {
                            view! { <TicketList /> }.into_view()
                        }
                    }}
                </section>
            </main>

            <TicketModal />
        </div>
    }
}

/// Realtime connection status
#[component]
fn LiveIndicator() -> impl IntoView {
    let state = use_context::<crate::state::GlobalState>().expect("GlobalState not found");

    move || {
        if state.live.get() {
            view! {
                <span class="flex items-center space-x-1 text-green-600 text-sm">
                    <span class="w-2 h-2 bg-green-500 rounded-full pulse" />
                    <span>"En vivo"</span>
                </span>
            }
        } else {
            view! {
                <span class="flex items-center space-x-1 text-gray-400 text-sm">
                    <span class="w-2 h-2 bg-gray-400 rounded-full" />
                    <span>"Desconectado"</span>
                </span>
            }
        }
    }
}
