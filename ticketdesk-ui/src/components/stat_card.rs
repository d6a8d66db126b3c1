//! Stat Cards
//!
//! Total / processed / negative / pending counters.

use leptos::*;

use crate::state::global::GlobalState;

/// One counter
#[component]
pub fn StatCard(
    #[prop(into)]
    label: String,
    #[prop(into)]
    value: Signal<usize>,
    /// Text color of the value
    #[prop(default = "text-gray-900")]
    accent: &'static str,
) -> impl IntoView {
    view! {
        <div class="bg-white rounded-lg shadow p-4 border border-gray-200">
            <div class="text-gray-500 text-sm">{label}</div>
            <div class=format!("text-3xl font-bold mt-2 {}", accent)>
                {move || value.get()}
            </div>
        </div>
    }
}

/// The four dashboard counters, recomputed from the mirror
#[component]
pub fn StatsGrid() -> impl IntoView {
    let state = use_context::<GlobalState>().expect("GlobalState not found");
    let stats = create_memo(move |_| state.stats());

    view! {
        <div class="grid grid-cols-2 md:grid-cols-4 gap-4">
            <StatCard label="Total Tickets" value=Signal::derive(move || stats.get().total) />
            <StatCard
                label="Procesados"
                value=Signal::derive(move || stats.get().processed)
                accent="text-green-600"
            />
            <StatCard
                label="Negativos"
                value=Signal::derive(move || stats.get().negative)
                accent="text-red-600"
            />
            <StatCard
                label="Pendientes"
                value=Signal::derive(move || stats.get().pending)
                accent="text-yellow-600"
            />
        </div>
    }
}
