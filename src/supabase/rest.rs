//! PostgREST client
//!
//! Bulk read of the ticket table, newest first.

use super::error::{SupabaseError, SupabaseResult};
use crate::config::{ConfigError, SupabaseConfig};
use crate::sync::source::TicketSource;
use crate::ticket::Ticket;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;

/// Read-only client for the ticket table
#[derive(Debug, Clone)]
pub struct SupabaseRest {
    client: Client,
    base_url: String,
    schema: String,
    table: String,
}

impl SupabaseRest {
    pub fn new(config: &SupabaseConfig) -> SupabaseResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.anon_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.anon_key))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            schema: config.schema.clone(),
            table: config.table.clone(),
        })
    }

    /// `GET` URL of the full-table read
    pub fn tickets_url(&self) -> String {
        format!(
            "{}/rest/v1/{}?select=*&order=created_at.desc",
            self.base_url,
            urlencoding::encode(&self.table)
        )
    }

    /// Fetch every ticket, newest first
    pub async fn fetch_tickets(&self) -> SupabaseResult<Vec<Ticket>> {
        let mut request = self.client.get(self.tickets_url());
        if self.schema != "public" {
            request = request.header("Accept-Profile", &self.schema);
        }

        let response = request.send().await.map_err(SupabaseError::from_send)?;

        if response.status().is_success() {
            let tickets: Vec<Ticket> = response.json().await?;
            tracing::debug!(count = tickets.len(), table = %self.table, "Read tickets");
            Ok(tickets)
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(SupabaseError::ApiError {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl TicketSource for SupabaseRest {
    type Error = SupabaseError;

    async fn fetch_all(&self) -> SupabaseResult<Vec<Ticket>> {
        self.fetch_tickets().await
    }
}

fn header_value(value: &str) -> SupabaseResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        SupabaseError::Config(ConfigError::Invalid {
            key: "supabase.anon_key",
            reason: e.to_string(),
        })
    })
}
