//! Ticketdesk CLI
//!
//! Command-line front end for the ticket dashboard:
//! - List tickets with the dashboard counts
//! - Show one ticket in detail
//! - Watch the live change feed
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use ticketdesk::config::{generate_default_config, Config, ConfigOrigin};
use ticketdesk::supabase::{RealtimeClient, RealtimeSettings, SupabaseRest};
use ticketdesk::sync::{SyncState, TicketSync};
use ticketdesk::view::render;
use ticketdesk::view::{DashboardStats, Selection};
use ticketdesk::{Ticket, TicketId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ticketdesk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live support-ticket dashboard")]
#[command(long_about = "Ticketdesk mirrors a Supabase ticket table.\nList tickets, inspect one, or watch changes arrive live.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/ticketdesk/config.toml, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all tickets, newest first
    List,

    /// Show one ticket
    Show {
        /// Ticket id, or an unambiguous prefix of it
        id: String,
    },

    /// Follow the change feed and redraw on every change
    Watch,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let (config, origin) = match &cli.config {
        Some(path) => {
            let config = Config::load_with_env(path)?;
            let origin = ConfigOrigin {
                path: Some(path.clone()),
                ..ConfigOrigin::default()
            };
            (config, origin)
        }
        None => Config::load_default(),
    };
    init_tracing(&config);
    origin.report();

    match cli.command {
        Commands::List => {
            let tickets = fetch(&config).await?;
            match cli.format {
                Format::Table => print!("{}", render::render_dashboard(&tickets, false)),
                Format::Json => print_json(&tickets)?,
            }
        }

        Commands::Show { id } => {
            let tickets = fetch(&config).await?;
            let id = resolve_id(&tickets, &id)?;

            let mut selection = Selection::new();
            selection.open_id(&tickets, &id);
            let Some(ticket) = selection.selected() else {
                bail!("Ticket {} not found", id);
            };

            match cli.format {
                Format::Table => print!("{}", render::render_detail(ticket)),
                Format::Json => println!("{}", serde_json::to_string_pretty(ticket)?),
            }
        }

        Commands::Watch => watch(&config, cli.format).await?,

        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ticketdesk={}", config.logging.level).into());

    let (json, pretty) = if config.logging.is_json() {
        (
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

async fn fetch(config: &Config) -> anyhow::Result<Vec<Ticket>> {
    let rest = SupabaseRest::new(&config.supabase)?;
    rest.fetch_tickets()
        .await
        .with_context(|| format!("Failed to read tickets from {}", config.supabase.url))
}

/// Exact id, else the single ticket whose id starts with `query`
fn resolve_id(tickets: &[Ticket], query: &str) -> anyhow::Result<TicketId> {
    if let Some(ticket) = tickets.iter().find(|t| t.id.as_str() == query) {
        return Ok(ticket.id.clone());
    }

    let matches: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| t.id.as_str().starts_with(query))
        .collect();

    match matches.as_slice() {
        [ticket] => Ok(ticket.id.clone()),
        [] => bail!("No ticket matches {}", query),
        many => bail!("{} tickets match {}, use a longer prefix", many.len(), query),
    }
}

async fn watch(config: &Config, format: Format) -> anyhow::Result<()> {
    let rest = SupabaseRest::new(&config.supabase)?;
    let feed = RealtimeClient::new(RealtimeSettings::from_config(
        &config.supabase,
        &config.realtime,
    )?);

    let mut session = TicketSync::new(rest, feed).start();
    draw(&session.snapshot(), format)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing subscription");
                break;
            }
            changed = session.changed() => {
                if !changed {
                    break;
                }
                draw(&session.snapshot(), format)?;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn draw(state: &SyncState, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Table => {
            // Clear screen, cursor home
            print!("\x1b[2J\x1b[H");
            print!(
                "{}",
                render::render_dashboard(state.tickets.tickets(), state.loading)
            );
            if !state.loading {
                println!();
                println!("{}", if state.live { "● live" } else { "○ offline" });
            }
        }
        Format::Json => {
            let frame = WatchFrame {
                loading: state.loading,
                live: state.live,
                stats: state.stats(),
                tickets: state.tickets.tickets(),
            };
            println!("{}", serde_json::to_string(&frame)?);
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct WatchFrame<'a> {
    loading: bool,
    live: bool,
    stats: DashboardStats,
    tickets: &'a [Ticket],
}

fn print_json(tickets: &[Ticket]) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "stats": DashboardStats::from_tickets(tickets),
        "tickets": tickets,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn write_default_config(output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Config written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
