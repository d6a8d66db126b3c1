//! Supabase client errors

use super::protocol::ProtocolError;
use crate::config::ConfigError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type SupabaseResult<T> = Result<T, SupabaseError>;
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Errors from the PostgREST read API
#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Supabase unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SupabaseError {
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SupabaseError::Timeout
        } else if e.is_connect() {
            SupabaseError::Unavailable
        } else {
            SupabaseError::Request(e)
        }
    }
}

/// Errors from the Realtime change feed
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Failed to connect: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("Socket error: {0}")]
    Socket(#[source] tungstenite::Error),

    #[error("Channel join rejected: {0}")]
    JoinRejected(String),

    #[error("No reply to channel join")]
    JoinTimeout,

    #[error("Heartbeat not acknowledged")]
    HeartbeatTimeout,

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Connection closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
