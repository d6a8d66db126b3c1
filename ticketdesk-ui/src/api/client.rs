//! PostgREST Client
//!
//! Bulk read of the ticket table from the browser.

use gloo_net::http::Request;
use ticketdesk::Ticket;

/// Local storage keys for the project settings
pub const URL_STORAGE_KEY: &str = "ticketdesk_supabase_url";
pub const KEY_STORAGE_KEY: &str = "ticketdesk_supabase_key";

/// Project URL and anon key used for both REST and Realtime
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
    pub table: String,
}

impl SupabaseSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }

    pub fn tickets_url(&self) -> String {
        format!(
            "{}/rest/v1/{}?select=*&order=created_at.desc",
            self.url, self.table
        )
    }
}

/// Settings from local storage, falling back to build-time values
pub fn supabase_settings() -> SupabaseSettings {
    let url = stored(URL_STORAGE_KEY)
        .or_else(|| option_env!("TICKETDESK_SUPABASE_URL").map(str::to_string))
        .unwrap_or_default();
    let anon_key = stored(KEY_STORAGE_KEY)
        .or_else(|| option_env!("TICKETDESK_SUPABASE_KEY").map(str::to_string))
        .unwrap_or_default();

    SupabaseSettings {
        url: url.trim_end_matches('/').to_string(),
        anon_key,
        table: "tickets".to_string(),
    }
}

fn stored(key: &str) -> Option<String> {
    let storage = web_sys::window()?.local_storage().ok()??;
    storage.get_item(key).ok()?.filter(|v| !v.is_empty())
}

/// Fetch every ticket, newest first
pub async fn fetch_tickets(settings: &SupabaseSettings) -> Result<Vec<Ticket>, String> {
    if !settings.is_configured() {
        return Err("Supabase URL or key not configured".to_string());
    }

    let response = Request::get(&settings.tickets_url())
        .header("apikey", &settings.anon_key)
        .header("Authorization", &format!("Bearer {}", settings.anon_key))
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;

    if !response.ok() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(format!("API error {}: {}", status, text));
    }

    response
        .json()
        .await
        .map_err(|e| format!("Parse error: {}", e))
}
