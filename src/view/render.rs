//! Plain-text rendering used by the CLI

use super::badge;
use super::stats::DashboardStats;
use crate::ticket::Ticket;
use std::fmt::Write;

pub const TITLE: &str = "AI Support Dashboard";
pub const LOADING: &str = "Cargando tickets...";
pub const EMPTY: &str = "No hay tickets";

const DESCRIPTION_WIDTH: usize = 48;

/// Full dashboard: title, counts, then either the loading line or the list
pub fn render_dashboard(tickets: &[Ticket], loading: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TITLE);
    let _ = writeln!(out, "{}", "=".repeat(TITLE.len()));
    out.push_str(&render_stats(&DashboardStats::from_tickets(tickets)));
    out.push('\n');
    if loading {
        let _ = writeln!(out, "{}", LOADING);
    } else {
        out.push_str(&render_list(tickets));
    }
    out
}

pub fn render_stats(stats: &DashboardStats) -> String {
    let mut out = String::new();
    for (label, value) in stats.cards() {
        let _ = writeln!(out, "{:<14} {:>6}", label, value);
    }
    out
}

pub fn render_list(tickets: &[Ticket]) -> String {
    if tickets.is_empty() {
        return format!("{}\n", EMPTY);
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<11} {:<10} {:<14} {:<12} {}",
        "ID", "Fecha", "Categoría", "Sentimiento", "Descripción"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));

    for ticket in tickets {
        let mut line = format!(
            "{:<11} {:<10} {:<14} {:<12} {}",
            format!("{}...", ticket.short_id()),
            ticket.created_date(),
            badge::category_badge(ticket).label,
            badge::sentiment_badge(ticket).label,
            clamp(&ticket.description, DESCRIPTION_WIDTH),
        );
        if let Some(processed) = badge::processed_badge(ticket) {
            line.push_str("  ");
            line.push_str(&processed.label);
        }
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// Detail view of one ticket: full id, full description, every badge
pub fn render_detail(ticket: &Ticket) -> String {
    let created = ticket
        .created_at_utc()
        .map(|dt| dt.format("%d/%m/%Y %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ticket.created_at.clone());

    let mut out = String::new();
    let _ = writeln!(out, "Ticket {}", ticket.id);
    let _ = writeln!(out, "Creado:      {}", created);
    let _ = writeln!(out, "Categoría:   {}", badge::category_badge(ticket).label);
    let _ = writeln!(out, "Sentimiento: {}", badge::sentiment_badge(ticket).label);
    let _ = writeln!(
        out,
        "Estado:      {}",
        if ticket.processed { "Procesado" } else { "Pendiente" }
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", ticket.description);
    out
}

fn clamp(text: &str, width: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    let mut clamped: String = single_line.chars().take(width.saturating_sub(1)).collect();
    clamped.push('…');
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(id: &str) -> Ticket {
        Ticket::new(id, "2024-05-01T10:00:00Z", "La factura de abril está duplicada")
    }

    #[test]
    fn test_loading_hides_list() {
        let out = render_dashboard(&[ticket("abcdef123456")], true);
        assert!(out.contains(LOADING));
        assert!(!out.contains("abcdef12..."));
        assert!(out.contains("Total Tickets"));
    }

    #[test]
    fn test_list_rows() {
        let tickets = vec![
            ticket("abcdef123456").category("Facturación").processed(true),
            ticket("0011223344"),
        ];
        let out = render_list(&tickets);
        assert!(out.contains("abcdef12..."));
        assert!(out.contains("01/05/2024"));
        assert!(out.contains("Facturación"));
        assert!(out.contains("Sin analizar"));
        assert_eq!(out.matches(badge::PROCESSED).count(), 1);
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(render_list(&[]), format!("{}\n", EMPTY));
    }

    #[test]
    fn test_detail_shows_full_fields() {
        let t = ticket("abcdef123456").sentiment("Negativo");
        let out = render_detail(&t);
        assert!(out.contains("Ticket abcdef123456"));
        assert!(out.contains("01/05/2024 10:00:00 UTC"));
        assert!(out.contains("Negativo"));
        assert!(out.contains("Pendiente"));
        assert!(out.contains("La factura de abril está duplicada"));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp("corto", 10), "corto");
        assert_eq!(clamp("uno\ndos   tres", 20), "uno dos tres");
        let long = "á".repeat(60);
        let clamped = clamp(&long, 10);
        assert_eq!(clamped.chars().count(), 10);
        assert!(clamped.ends_with('…'));
    }
}
