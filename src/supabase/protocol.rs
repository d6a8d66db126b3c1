//! Realtime wire protocol
//!
//! Supabase Realtime speaks Phoenix channels, protocol v1 with JSON frames:
//!
//! ```json
//! {"topic": "realtime:tickets-channel", "event": "phx_join",
//!  "payload": {...}, "ref": "1", "join_ref": "1"}
//! ```
//!
//! This module only builds and decodes frames, so both the native socket
//! client and the browser dashboard share it.

use crate::sync::event::{ChangeEvent, ChangeKind};
use crate::ticket::{Ticket, TicketId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Protocol version sent in the socket URL
pub const VSN: &str = "1.0.0";

/// Topic used for socket-level heartbeats
pub const PHOENIX_TOPIC: &str = "phoenix";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_SYSTEM: &str = "system";

/// One Phoenix frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// The table a channel listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl Default for TableRef {
    fn default() -> Self {
        Self::new("public", "tickets")
    }
}

/// Channel topic for a channel name
pub fn channel_topic(channel: &str) -> String {
    format!("realtime:{}", channel)
}

/// WebSocket endpoint for a project URL (`https://xyz.supabase.co`)
pub fn socket_url(project_url: &str, api_key: &str) -> String {
    let base = project_url
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn={}",
        base,
        urlencoding::encode(api_key),
        VSN
    )
}

impl PhoenixMessage {
    /// Join a channel listening to every change on `table`
    pub fn join(topic: &str, table: &TableRef, access_token: &str, msg_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": &table.schema, "table": &table.table }
                    ],
                    "private": false
                },
                "access_token": access_token
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    pub fn leave(topic: &str, msg_ref: &str, join_ref: Option<&str>) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: join_ref.map(str::to_string),
        }
    }

    pub fn heartbeat(msg_ref: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Interpret a received frame
    pub fn classify(self) -> Result<Inbound, ProtocolError> {
        match self.event.as_str() {
            EVENT_REPLY => {
                let reply: ReplyPayload = serde_json::from_value(self.payload)?;
                Ok(Inbound::Reply {
                    topic: self.topic,
                    msg_ref: self.msg_ref,
                    ok: reply.status == "ok",
                    response: reply.response,
                })
            }
            EVENT_POSTGRES_CHANGES => {
                let payload: ChangePayload = serde_json::from_value(self.payload)?;
                Ok(Inbound::Change(payload.data.into_event()?))
            }
            EVENT_SYSTEM => {
                let system: SystemPayload = serde_json::from_value(self.payload)?;
                Ok(Inbound::System {
                    ok: system.status == "ok",
                    message: system.message,
                })
            }
            EVENT_CLOSE => Ok(Inbound::Closed { topic: self.topic }),
            EVENT_ERROR => Ok(Inbound::ChannelError {
                topic: self.topic,
                payload: self.payload,
            }),
            _ => Ok(Inbound::Other { event: self.event }),
        }
    }
}

/// A decoded server frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to a join, leave or heartbeat
    Reply {
        topic: String,
        msg_ref: Option<String>,
        ok: bool,
        response: Value,
    },
    /// A row change on the subscribed table
    Change(ChangeEvent),
    /// Server status notice (e.g. "Subscribed to PostgreSQL")
    System { ok: bool, message: String },
    /// The server closed the channel
    Closed { topic: String },
    ChannelError { topic: String, payload: Value },
    /// Presence and other events this client does not use
    Other { event: String },
}

impl Inbound {
    /// Human-readable reason of a rejected reply
    pub fn rejection_reason(response: &Value) -> String {
        response
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| response.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    status: String,
    #[serde(default)]
    response: Value,
}

#[derive(Debug, Deserialize)]
struct SystemPayload {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

/// Body of a `postgres_changes` frame
#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OldKey {
    id: TicketId,
}

impl ChangeData {
    fn into_event(self) -> Result<ChangeEvent, ProtocolError> {
        let kind =
            ChangeKind::from_tag(&self.kind).ok_or(ProtocolError::UnknownChangeType(self.kind))?;

        match kind {
            ChangeKind::Insert => Ok(ChangeEvent::Insert(row(kind, self.record)?)),
            ChangeKind::Update => Ok(ChangeEvent::Update(row(kind, self.record)?)),
            ChangeKind::Delete => {
                let old = self.old_record.ok_or(ProtocolError::MissingRecord(kind))?;
                let key: OldKey = serde_json::from_value(old)
                    .map_err(|source| ProtocolError::InvalidRecord { kind, source })?;
                Ok(ChangeEvent::Delete(key.id))
            }
        }
    }
}

fn row(kind: ChangeKind, record: Option<Value>) -> Result<Ticket, ProtocolError> {
    let record = record.ok_or(ProtocolError::MissingRecord(kind))?;
    serde_json::from_value(record).map_err(|source| ProtocolError::InvalidRecord { kind, source })
}

/// Frame encoding and decoding errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown change type: {0}")]
    UnknownChangeType(String),

    #[error("{0} change without a record")]
    MissingRecord(ChangeKind),

    #[error("Invalid {kind} record: {source}")]
    InvalidRecord {
        kind: ChangeKind,
        source: serde_json::Error,
    },
}
