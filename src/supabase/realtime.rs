//! Realtime change feed client
//!
//! Opens a WebSocket to Supabase Realtime, joins the ticket channel and
//! forwards `postgres_changes` frames as [`ChangeEvent`]s. The socket is
//! owned by a transport task that keeps the channel alive with heartbeats
//! and reconnects with exponential backoff when the connection drops.

use super::error::{RealtimeError, RealtimeResult};
use super::protocol::{self, Inbound, PhoenixMessage, TableRef};
use crate::config::{RealtimeConfig, SupabaseConfig};
use crate::sync::event::ChangeEvent;
use crate::sync::source::{ChangeFeed, Subscription, SubscriptionHandle};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Realtime client settings
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub project_url: String,
    pub api_key: String,
    pub channel: String,
    pub table: TableRef,
    pub heartbeat_interval: Duration,
    pub join_timeout: Duration,
    pub max_reconnect_attempts: u32,
}

impl RealtimeSettings {
    pub fn from_config(supabase: &SupabaseConfig, realtime: &RealtimeConfig) -> RealtimeResult<Self> {
        supabase.validate()?;
        Ok(Self {
            project_url: supabase.url.clone(),
            api_key: supabase.anon_key.clone(),
            channel: realtime.channel.clone(),
            table: TableRef::new(&supabase.schema, &supabase.table),
            heartbeat_interval: Duration::from_secs(realtime.heartbeat_interval_secs.max(1)),
            join_timeout: JOIN_TIMEOUT,
            max_reconnect_attempts: realtime.max_reconnect_attempts,
        })
    }

    fn topic(&self) -> String {
        protocol::channel_topic(&self.channel)
    }
}

/// Change feed backed by Supabase Realtime
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    settings: RealtimeSettings,
}

impl RealtimeClient {
    pub fn new(settings: RealtimeSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    type Error = RealtimeError;

    async fn subscribe(&self) -> RealtimeResult<Subscription> {
        let channel = Channel::open(&self.settings).await?;
        tracing::info!(channel = %self.settings.channel, "Joined realtime channel");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(transport(
            channel,
            self.settings.clone(),
            events_tx,
            close_rx,
        ));

        Ok(Subscription::new(
            events_rx,
            SubscriptionHandle::new(close_tx, task),
        ))
    }
}

/// Delay before reconnect attempt `attempt` (1-based)
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.min(16));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// A joined channel on an open socket
struct Channel {
    socket: Socket,
    topic: String,
    join_ref: String,
    next_ref: u64,
}

/// Why a connection stopped pumping frames
enum Stop {
    /// Close requested or nobody is listening anymore
    Shutdown,
    Lost(RealtimeError),
}

impl Channel {
    /// Connect and join, waiting for the join reply
    async fn open(settings: &RealtimeSettings) -> RealtimeResult<Self> {
        let url = protocol::socket_url(&settings.project_url, &settings.api_key);
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(RealtimeError::Connect)?;

        let mut channel = Channel {
            socket,
            topic: settings.topic(),
            join_ref: String::new(),
            next_ref: 0,
        };

        let join_ref = channel.make_ref();
        let join = PhoenixMessage::join(&channel.topic, &settings.table, &settings.api_key, &join_ref);
        channel.send(&join).await?;
        channel.join_ref = join_ref;

        tokio::time::timeout(settings.join_timeout, channel.await_join())
            .await
            .map_err(|_| RealtimeError::JoinTimeout)??;

        Ok(channel)
    }

    async fn await_join(&mut self) -> RealtimeResult<()> {
        loop {
            let Some(text) = self.next_text().await? else {
                continue;
            };
            match PhoenixMessage::decode(&text).and_then(PhoenixMessage::classify) {
                Ok(Inbound::Reply {
                    topic,
                    msg_ref,
                    ok,
                    response,
                }) if topic == self.topic && msg_ref.as_deref() == Some(self.join_ref.as_str()) => {
                    return if ok {
                        Ok(())
                    } else {
                        Err(RealtimeError::JoinRejected(Inbound::rejection_reason(
                            &response,
                        )))
                    };
                }
                Ok(other) => tracing::debug!(frame = ?other, "Frame before join reply"),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed frame"),
            }
        }
    }

    /// Next text frame, `None` for control frames
    async fn next_text(&mut self) -> RealtimeResult<Option<String>> {
        match self.socket.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(text)),
            Some(Ok(Message::Close(_))) | None => Err(RealtimeError::Closed),
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => Err(RealtimeError::Socket(e)),
        }
    }

    fn make_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    async fn send(&mut self, message: &PhoenixMessage) -> RealtimeResult<()> {
        let text = message.encode()?;
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(RealtimeError::Socket)
    }

    /// Forward change frames until the connection is lost or closed
    async fn pump(
        &mut self,
        heartbeat_interval: Duration,
        events_tx: &mpsc::UnboundedSender<ChangeEvent>,
        close_rx: &mut oneshot::Receiver<()>,
    ) -> Stop {
        let start = tokio::time::Instant::now() + heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(start, heartbeat_interval);
        let mut pending_heartbeat: Option<String> = None;

        loop {
            tokio::select! {
                _ = &mut *close_rx => return Stop::Shutdown,
                _ = events_tx.closed() => return Stop::Shutdown,
                _ = heartbeat.tick() => {
                    if pending_heartbeat.is_some() {
                        return Stop::Lost(RealtimeError::HeartbeatTimeout);
                    }
                    let msg_ref = self.make_ref();
                    if let Err(e) = self.send(&PhoenixMessage::heartbeat(&msg_ref)).await {
                        return Stop::Lost(e);
                    }
                    pending_heartbeat = Some(msg_ref);
                }
                frame = self.next_text() => {
                    let text = match frame {
                        Ok(Some(text)) => text,
                        Ok(None) => continue,
                        Err(e) => return Stop::Lost(e),
                    };
                    let inbound = match PhoenixMessage::decode(&text).and_then(PhoenixMessage::classify) {
                        Ok(inbound) => inbound,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed frame");
                            continue;
                        }
                    };
                    match inbound {
                        Inbound::Change(event) => {
                            if events_tx.send(event).is_err() {
                                return Stop::Shutdown;
                            }
                        }
                        Inbound::Reply { msg_ref, .. } if msg_ref.is_some() && msg_ref == pending_heartbeat => {
                            pending_heartbeat = None;
                        }
                        Inbound::Closed { topic } if topic == self.topic => {
                            return Stop::Lost(RealtimeError::Closed);
                        }
                        Inbound::ChannelError { topic, payload } if topic == self.topic => {
                            return Stop::Lost(RealtimeError::Channel(payload.to_string()));
                        }
                        Inbound::System { ok: false, message } => {
                            tracing::warn!(channel = %self.topic, %message, "Realtime system error");
                        }
                        other => tracing::debug!(frame = ?other, "Ignoring frame"),
                    }
                }
            }
        }
    }

    /// Leave the channel and close the socket
    async fn leave(mut self) {
        let msg_ref = self.make_ref();
        let leave = PhoenixMessage::leave(&self.topic, &msg_ref, Some(&self.join_ref));
        if let Err(e) = self.send(&leave).await {
            tracing::debug!(error = %e, "Failed to send leave");
        }
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "Failed to close socket");
        }
    }
}

/// Owns the socket for the lifetime of the subscription
async fn transport(
    mut channel: Channel,
    settings: RealtimeSettings,
    events_tx: mpsc::UnboundedSender<ChangeEvent>,
    mut close_rx: oneshot::Receiver<()>,
) {
    loop {
        let error = match channel
            .pump(settings.heartbeat_interval, &events_tx, &mut close_rx)
            .await
        {
            Stop::Shutdown => {
                channel.leave().await;
                tracing::info!(channel = %settings.channel, "Left realtime channel");
                return;
            }
            Stop::Lost(error) => error,
        };

        tracing::warn!(channel = %settings.channel, error = %error, "Realtime connection lost");
        drop(channel);

        channel = match reconnect(&settings, &mut close_rx).await {
            Some(channel) => channel,
            None => return,
        };
    }
}

/// Reconnect with backoff. `None` when closed meanwhile or out of attempts.
async fn reconnect(
    settings: &RealtimeSettings,
    close_rx: &mut oneshot::Receiver<()>,
) -> Option<Channel> {
    for attempt in 1..=settings.max_reconnect_attempts {
        let delay = backoff_delay(attempt);
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting to realtime");

        tokio::select! {
            _ = &mut *close_rx => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let opened = tokio::select! {
            _ = &mut *close_rx => return None,
            opened = Channel::open(settings) => opened,
        };

        match opened {
            Ok(channel) => {
                tracing::info!(channel = %settings.channel, attempt, "Rejoined realtime channel");
                return Some(channel);
            }
            Err(e) => tracing::warn!(attempt, error = %e, "Reconnect failed"),
        }
    }

    tracing::error!(
        channel = %settings.channel,
        attempts = settings.max_reconnect_attempts,
        "Giving up on realtime connection"
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketId;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    type ServerSocket = WebSocketStream<TcpStream>;

    fn settings(url: String) -> RealtimeSettings {
        RealtimeSettings {
            project_url: url,
            api_key: "anon-key".to_string(),
            channel: "tickets-channel".to_string(),
            table: TableRef::default(),
            heartbeat_interval: Duration::from_secs(25),
            join_timeout: Duration::from_secs(2),
            max_reconnect_attempts: 0,
        }
    }

    async fn recv_frame(ws: &mut ServerSocket) -> Option<Value> {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                return Some(serde_json::from_str(&text).unwrap());
            }
        }
        None
    }

    async fn send_frame(ws: &mut ServerSocket, frame: Value) {
        ws.send(Message::Text(frame.to_string())).await.unwrap();
    }

    fn reply(join: &Value, status: &str, response: Value) -> Value {
        let topic = join["topic"].clone();
        let msg_ref = join["ref"].clone();
        let join_ref = join["join_ref"].clone();
        json!({
            "topic": topic,
            "event": "phx_reply",
            "payload": {"status": status, "response": response},
            "ref": msg_ref,
            "join_ref": join_ref
        })
    }

    /// Accept one socket and answer its join with `status`
    async fn accept_and_join(listener: &TcpListener, status: &str) -> (ServerSocket, Value) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let join = recv_frame(&mut ws).await.unwrap();
        let response = if status == "ok" {
            json!({"postgres_changes": [{"id": 1, "event": "*", "schema": "public", "table": "tickets"}]})
        } else {
            json!({"reason": "invalid access token"})
        };
        send_frame(&mut ws, reply(&join, status, response)).await;
        (ws, join)
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(16));
        assert_eq!(backoff_delay(5), Duration::from_secs(30));
        assert_eq!(backoff_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_require_credentials() {
        let supabase = SupabaseConfig::default();
        let realtime = RealtimeConfig::default();
        assert!(matches!(
            RealtimeSettings::from_config(&supabase, &realtime),
            Err(RealtimeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_forwards_changes_and_leaves() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut ws, join) = accept_and_join(&listener, "ok").await;
            assert_eq!(join["event"], "phx_join");
            assert_eq!(join["topic"], "realtime:tickets-channel");
            assert_eq!(join["payload"]["config"]["postgres_changes"][0]["table"], "tickets");

            send_frame(
                &mut ws,
                json!({"topic": "realtime:tickets-channel", "event": "presence_state", "payload": {}, "ref": null}),
            )
            .await;
            send_frame(&mut ws, json!({"topic": "realtime:tickets-channel", "event": "postgres_changes", "payload": {"nope": 1}, "ref": null})).await;
            send_frame(
                &mut ws,
                json!({
                    "topic": "realtime:tickets-channel",
                    "event": "postgres_changes",
                    "payload": {"data": {
                        "type": "INSERT",
                        "record": {"id": "b", "created_at": "2024-05-01T10:00:00Z",
                                   "description": "nuevo", "category": null,
                                   "sentiment": null, "processed": false},
                        "old_record": null
                    }},
                    "ref": null
                }),
            )
            .await;
            send_frame(
                &mut ws,
                json!({
                    "topic": "realtime:tickets-channel",
                    "event": "postgres_changes",
                    "payload": {"data": {"type": "DELETE", "record": null, "old_record": {"id": "a"}}},
                    "ref": null
                }),
            )
            .await;

            // Next frame from the client is the leave
            recv_frame(&mut ws).await
        });

        let client = RealtimeClient::new(settings(url));
        let (mut events, handle) = client.subscribe().await.unwrap().into_parts();

        match events.recv().await {
            Some(ChangeEvent::Insert(ticket)) => assert_eq!(ticket.id.as_str(), "b"),
            other => panic!("Expected insert, got {:?}", other),
        }
        match events.recv().await {
            Some(ChangeEvent::Delete(id)) => assert_eq!(id, TicketId::new("a")),
            other => panic!("Expected delete, got {:?}", other),
        }

        handle.close().await;

        let leave = server.await.unwrap().unwrap();
        assert_eq!(leave["event"], "phx_leave");
        assert_eq!(leave["topic"], "realtime:tickets-channel");
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_join() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (ws, _) = accept_and_join(&listener, "error").await;
            ws
        });

        let client = RealtimeClient::new(settings(url));
        match client.subscribe().await {
            Err(RealtimeError::JoinRejected(reason)) => assert_eq!(reason, "invalid access token"),
            Err(e) => panic!("Expected rejection, got {}", e),
            Ok(_) => panic!("Expected rejection, got a subscription"),
        }
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_stream_ends_when_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut ws, _) = accept_and_join(&listener, "ok").await;
            ws.close(None).await.unwrap();
        });

        // No reconnect attempts configured: the stream ends on the first drop
        let client = RealtimeClient::new(settings(url));
        let (mut events, handle) = client.subscribe().await.unwrap().into_parts();

        assert!(events.recv().await.is_none());
        server.await.unwrap();
        handle.close().await;
    }

    #[tokio::test]
    async fn test_reconnects_and_rejoins() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut first, _) = accept_and_join(&listener, "ok").await;
            first.close(None).await.unwrap();
            drop(first);

            let (mut ws, rejoin) = accept_and_join(&listener, "ok").await;
            assert_eq!(rejoin["event"], "phx_join");
            assert_eq!(rejoin["topic"], "realtime:tickets-channel");
            send_frame(
                &mut ws,
                json!({
                    "topic": "realtime:tickets-channel",
                    "event": "postgres_changes",
                    "payload": {"data": {
                        "type": "INSERT",
                        "record": {"id": "r", "created_at": "2024-05-01T10:00:00Z",
                                   "description": "tras reconectar", "processed": false},
                        "old_record": null
                    }},
                    "ref": null
                }),
            )
            .await;
            recv_frame(&mut ws).await
        });

        let mut settings = settings(url);
        settings.max_reconnect_attempts = 1;
        let client = RealtimeClient::new(settings);
        let (mut events, handle) = client.subscribe().await.unwrap().into_parts();

        // First attempt waits out the 2 s backoff
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap();
        match event {
            Some(ChangeEvent::Insert(ticket)) => assert_eq!(ticket.id.as_str(), "r"),
            other => panic!("Expected insert after rejoin, got {:?}", other),
        }

        handle.close().await;
        let leave = server.await.unwrap().unwrap();
        assert_eq!(leave["event"], "phx_leave");
    }

    #[tokio::test]
    async fn test_unanswered_heartbeat_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut ws, _) = accept_and_join(&listener, "ok").await;
            // Never reply; read until the client hangs up
            let mut frames = Vec::new();
            while let Some(frame) = recv_frame(&mut ws).await {
                frames.push(frame);
            }
            frames
        });

        let mut settings = settings(url);
        settings.heartbeat_interval = Duration::from_millis(100);
        let client = RealtimeClient::new(settings);
        let (mut events, handle) = client.subscribe().await.unwrap().into_parts();

        let end = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap();
        assert!(end.is_none());

        let frames = server.await.unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "heartbeat");
        assert_eq!(frames[0]["topic"], "phoenix");
        handle.close().await;
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_rejoin() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (rejoin_tx, rejoin_rx) = oneshot::channel();

        let server = tokio::spawn(async move {
            let (mut first, _) = accept_and_join(&listener, "ok").await;
            first.close(None).await.unwrap();
            drop(first);

            // Take the rejoin but leave it unanswered
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let join = recv_frame(&mut ws).await.unwrap();
            rejoin_tx.send(join).unwrap();
            while recv_frame(&mut ws).await.is_some() {}
        });

        let mut settings = settings(url);
        settings.max_reconnect_attempts = 1;
        settings.join_timeout = Duration::from_secs(30);
        let client = RealtimeClient::new(settings);
        let (mut events, handle) = client.subscribe().await.unwrap().into_parts();

        let join = tokio::time::timeout(Duration::from_secs(10), rejoin_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(join["event"], "phx_join");

        tokio::time::timeout(Duration::from_secs(2), handle.close())
            .await
            .expect("close must not wait for the join timeout");
        assert!(events.recv().await.is_none());
        server.await.unwrap();
    }
}
