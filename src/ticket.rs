//! Ticket model
//!
//! The only entity the dashboard knows about. Field names match the
//! `tickets` table columns so rows deserialize straight from PostgREST and
//! from realtime change payloads.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque ticket identifier, the reconciliation key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TicketId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A support ticket with its AI-derived annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    /// Creation timestamp as stored by the backend (ISO 8601)
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Category label, `None` until the ticket has been classified
    #[serde(default)]
    pub category: Option<String>,
    /// Sentiment label, `None` until the ticket has been classified
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed: bool,
}

/// Columns without a NOT NULL constraint come back as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Ticket {
    /// Create an unprocessed ticket
    pub fn new(
        id: impl Into<TicketId>,
        created_at: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: created_at.into(),
            description: description.into(),
            category: None,
            sentiment: None,
            processed: false,
        }
    }

    /// Builder method: set the category label
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Builder method: set the sentiment label
    pub fn sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = Some(sentiment.into());
        self
    }

    /// Builder method: set the processed flag
    pub fn processed(mut self, processed: bool) -> Self {
        self.processed = processed;
        self
    }

    /// First eight characters of the id, as shown on list cards
    pub fn short_id(&self) -> &str {
        let id = self.id.as_str();
        match id.char_indices().nth(8) {
            Some((idx, _)) => &id[..idx],
            None => id,
        }
    }

    /// Parsed creation time
    ///
    /// Accepts RFC 3339 (`2024-05-01T10:00:00Z`, `...+00:00`) and the
    /// offset-less form Postgres emits for `timestamp` columns, read as UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Creation date in `dd/mm/yyyy` form; falls back to the raw value
    pub fn created_date(&self) -> String {
        self.created_at_utc()
            .map(|dt| dt.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| self.created_at.clone())
    }

    /// Known sentiment, if the label is one
    pub fn known_sentiment(&self) -> Option<Sentiment> {
        self.sentiment.as_deref().and_then(Sentiment::from_label)
    }

    pub fn is_negative(&self) -> bool {
        self.known_sentiment() == Some(Sentiment::Negative)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres text output uses a space separator and may omit the offset
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Ticket categories assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Technical,
    Billing,
    Commercial,
}

impl Category {
    /// Match a stored label. The classifier prompt spells the technical
    /// category without the accent, so both spellings are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Técnico" | "Tecnico" => Some(Self::Technical),
            "Facturación" => Some(Self::Billing),
            "Comercial" => Some(Self::Commercial),
            _ => None,
        }
    }
}

/// Ticket sentiment assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Positivo" => Some(Self::Positive),
            "Neutral" => Some(Self::Neutral),
            "Negativo" => Some(Self::Negative),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_row() {
        let json = r#"{
            "id": "5f0c6a8e-1b2c-4d3e-9f00-112233445566",
            "created_at": "2024-05-01T10:15:00.123456+00:00",
            "description": "No puedo iniciar sesión",
            "category": null,
            "sentiment": null,
            "processed": false,
            "priority": 3
        }"#;
        let ticket: Ticket = serde_json::from_str(json).unwrap();
        assert_eq!(ticket.id.as_str(), "5f0c6a8e-1b2c-4d3e-9f00-112233445566");
        assert!(ticket.category.is_none());
        assert!(!ticket.processed);
    }

    #[test]
    fn test_null_columns_take_defaults() {
        let json = r#"[
            {"id": "a", "created_at": "2024-05-01T10:00:00Z", "description": "Ok", "processed": true},
            {"id": "b", "created_at": "2024-05-02T10:00:00Z", "description": null, "processed": null},
            {"id": "c", "created_at": "2024-05-03T10:00:00Z"}
        ]"#;
        let tickets: Vec<Ticket> = serde_json::from_str(json).unwrap();
        assert_eq!(tickets.len(), 3);
        assert!(tickets[0].processed);
        assert_eq!(tickets[1].description, "");
        assert!(!tickets[1].processed);
        assert_eq!(tickets[2], Ticket::new("c", "2024-05-03T10:00:00Z", ""));
    }

    #[test]
    fn test_short_id() {
        let ticket = Ticket::new("5f0c6a8e-1b2c", "2024-05-01T10:00:00Z", "x");
        assert_eq!(ticket.short_id(), "5f0c6a8e");

        let short = Ticket::new("abc", "2024-05-01T10:00:00Z", "x");
        assert_eq!(short.short_id(), "abc");
    }

    #[test]
    fn test_created_date_formats() {
        let rfc = Ticket::new("a", "2024-05-01T10:00:00Z", "x");
        assert_eq!(rfc.created_date(), "01/05/2024");

        let offset = Ticket::new("a", "2024-12-31T23:30:00.5+00:00", "x");
        assert_eq!(offset.created_date(), "31/12/2024");

        let naive = Ticket::new("a", "2024-02-03T04:05:06.789", "x");
        assert_eq!(naive.created_date(), "03/02/2024");

        let garbage = Ticket::new("a", "yesterday", "x");
        assert_eq!(garbage.created_date(), "yesterday");
        assert!(garbage.created_at_utc().is_none());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(Category::from_label("Técnico"), Some(Category::Technical));
        assert_eq!(Category::from_label("Tecnico"), Some(Category::Technical));
        assert_eq!(Category::from_label("Facturación"), Some(Category::Billing));
        assert_eq!(Category::from_label("Otro"), None);
    }

    #[test]
    fn test_negative_sentiment() {
        let ticket = Ticket::new("a", "2024-05-01T10:00:00Z", "x").sentiment("Negativo");
        assert!(ticket.is_negative());

        let lowercase = Ticket::new("a", "2024-05-01T10:00:00Z", "x").sentiment("negativo");
        assert!(!lowercase.is_negative());
    }
}
