//! Loading Component

use leptos::*;
use ticketdesk::view::render::LOADING;

/// Spinner shown until the initial read resolves
#[component]
pub fn Loading() -> impl IntoView {
    view! {
        <div class="flex flex-col items-center justify-center py-12 text-gray-500">
            <div class="loading-spinner w-8 h-8 mb-3" />
            <span>{LOADING}</span>
        </div>
    }
}
