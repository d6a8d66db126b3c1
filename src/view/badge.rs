//! Badge tones and labels for category, sentiment and processed state

use crate::ticket::{Category, Sentiment, Ticket};

/// Display treatment of a badge. Renderers map tones to their own palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Green,
    Red,
    Gray,
    Blue,
    Purple,
    Yellow,
    /// Absent or unrecognised value
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub label: String,
    pub tone: Tone,
}

pub const NO_CATEGORY: &str = "Sin categoría";
pub const NOT_ANALYZED: &str = "Sin analizar";
pub const PROCESSED: &str = "✓ Procesado";

pub fn sentiment_tone(sentiment: Option<&str>) -> Tone {
    match sentiment.and_then(Sentiment::from_label) {
        Some(Sentiment::Positive) => Tone::Green,
        Some(Sentiment::Negative) => Tone::Red,
        Some(Sentiment::Neutral) => Tone::Gray,
        None => Tone::Muted,
    }
}

pub fn category_tone(category: Option<&str>) -> Tone {
    match category.and_then(Category::from_label) {
        Some(Category::Technical) => Tone::Blue,
        Some(Category::Billing) => Tone::Purple,
        Some(Category::Commercial) => Tone::Yellow,
        None => Tone::Muted,
    }
}

/// Category badge; unknown labels are shown verbatim in the muted tone
pub fn category_badge(ticket: &Ticket) -> Badge {
    Badge {
        label: non_empty(ticket.category.as_deref())
            .unwrap_or(NO_CATEGORY)
            .to_string(),
        tone: category_tone(ticket.category.as_deref()),
    }
}

pub fn sentiment_badge(ticket: &Ticket) -> Badge {
    Badge {
        label: non_empty(ticket.sentiment.as_deref())
            .unwrap_or(NOT_ANALYZED)
            .to_string(),
        tone: sentiment_tone(ticket.sentiment.as_deref()),
    }
}

/// Present only for processed tickets
pub fn processed_badge(ticket: &Ticket) -> Option<Badge> {
    ticket.processed.then(|| Badge {
        label: PROCESSED.to_string(),
        tone: Tone::Green,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
