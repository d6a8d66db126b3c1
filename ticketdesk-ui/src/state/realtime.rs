//! Realtime Client
//!
//! Browser WebSocket connection to Supabase Realtime. Joins the ticket
//! channel and applies each `postgres_changes` frame to the global mirror.
//!
//! A subscription exists only once its join has been confirmed, so closing
//! is deferred: a close requested while the join is in flight is carried out
//! as soon as the join resolves.

use leptos::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use ticketdesk::supabase::protocol::{self, Inbound, PhoenixMessage, TableRef};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use super::global::GlobalState;
use crate::api::SupabaseSettings;

pub const CHANNEL: &str = "tickets-channel";
const HEARTBEAT_INTERVAL_MS: u32 = 25_000;
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay before reconnect attempt `attempt` (0-based)
pub fn reconnect_delay_ms(attempt: u32) -> u32 {
    2_u32
        .saturating_pow(attempt)
        .saturating_mul(1000)
        .min(30_000)
}

/// Anything that can be told to close
pub trait Close {
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Connecting,
    Joined,
    Closed,
}

/// Channel lifecycle with deferred close
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: Phase,
    close_requested: bool,
}

impl Lifecycle {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true if the channel should be left right away
    pub fn request_close(&mut self) -> bool {
        self.close_requested = true;
        match self.phase {
            Phase::Joined => {
                self.phase = Phase::Closed;
                true
            }
            Phase::Connecting | Phase::Closed => false,
        }
    }

    /// Join confirmed. Returns true if a close arrived meanwhile.
    pub fn joined(&mut self) -> bool {
        if self.close_requested {
            self.phase = Phase::Closed;
            true
        } else {
            self.phase = Phase::Joined;
            false
        }
    }

    pub fn rejected(&mut self) {
        self.phase = Phase::Closed;
    }

    /// Connection dropped. Returns true if it should be re-established.
    pub fn lost(&mut self) -> bool {
        if self.close_requested || self.phase == Phase::Closed {
            self.phase = Phase::Closed;
            false
        } else {
            self.phase = Phase::Connecting;
            true
        }
    }

    /// Reconnect timer fired. False once the channel was released.
    pub fn retry(&mut self) -> bool {
        if self.close_requested {
            self.phase = Phase::Closed;
        }
        self.phase != Phase::Closed
    }
}

/// Holds a subscription that may not exist yet
///
/// `release` before `fill` closes the value as soon as it arrives; either
/// way the value is closed exactly once.
pub struct SubscriptionSlot<T: Close>(Rc<RefCell<Slot<T>>>);

enum Slot<T> {
    Pending,
    Open(T),
    Released,
}

impl<T: Close> Clone for SubscriptionSlot<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Close> Default for SubscriptionSlot<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(Slot::Pending)))
    }
}

impl<T: Close> SubscriptionSlot<T> {
    pub fn fill(&self, value: T) {
        let mut slot = self.0.borrow_mut();
        match *slot {
            Slot::Pending => *slot = Slot::Open(value),
            Slot::Open(_) | Slot::Released => {
                drop(slot);
                value.close();
            }
        }
    }

    pub fn release(&self) {
        let previous = std::mem::replace(&mut *self.0.borrow_mut(), Slot::Released);
        if let Slot::Open(value) = previous {
            value.close();
        }
    }
}

/// Live subscription to the ticket channel
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Rc<Inner>,
}

struct Inner {
    url: String,
    access_token: String,
    topic: String,
    table: TableRef,
    state: GlobalState,
    ws: RefCell<Option<WebSocket>>,
    lifecycle: RefCell<Lifecycle>,
    next_ref: Cell<u64>,
    join_ref: RefCell<String>,
    reconnect_attempts: Cell<u32>,
    heartbeat: RefCell<Option<gloo_timers::callback::Interval>>,
}

impl RealtimeChannel {
    /// Open the socket and join the ticket channel
    pub fn connect(settings: &SupabaseSettings, state: GlobalState) -> Self {
        let inner = Rc::new(Inner {
            url: protocol::socket_url(&settings.url, &settings.anon_key),
            access_token: settings.anon_key.clone(),
            topic: protocol::channel_topic(CHANNEL),
            table: TableRef::new("public", settings.table.clone()),
            state,
            ws: RefCell::new(None),
            lifecycle: RefCell::new(Lifecycle::default()),
            next_ref: Cell::new(0),
            join_ref: RefCell::new(String::new()),
            reconnect_attempts: Cell::new(0),
            heartbeat: RefCell::new(None),
        });
        open_socket(&inner);
        Self { inner }
    }
}

impl Close for RealtimeChannel {
    fn close(&self) {
        if self.inner.lifecycle.borrow_mut().request_close() {
            leave(&self.inner);
        }
    }
}

impl Inner {
    fn make_ref(&self) -> String {
        let next = self.next_ref.get() + 1;
        self.next_ref.set(next);
        next.to_string()
    }

    fn send(&self, message: &PhoenixMessage) {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                web_sys::console::error_1(&format!("Failed to encode frame: {}", e).into());
                return;
            }
        };
        if let Some(ws) = self.ws.borrow().as_ref() {
            if let Err(e) = ws.send_with_str(&text) {
                web_sys::console::error_1(&format!("WebSocket send failed: {:?}", e).into());
            }
        }
    }

    fn close_socket(&self) {
        self.heartbeat.borrow_mut().take();
        if let Some(ws) = self.ws.borrow().as_ref() {
            let _ = ws.close();
        }
    }
}

fn open_socket(inner: &Rc<Inner>) {
    match WebSocket::new(&inner.url) {
        Ok(ws) => {
            setup_handlers(inner, &ws);
            *inner.ws.borrow_mut() = Some(ws);
        }
        Err(e) => {
            web_sys::console::error_1(&format!("WebSocket connection failed: {:?}", e).into());
            schedule_reconnect(inner);
        }
    }
}

fn setup_handlers(inner: &Rc<Inner>, ws: &WebSocket) {
    // On open: join and start heartbeats
    let open_inner = Rc::clone(inner);
    let on_open = Closure::wrap(Box::new(move |_: JsValue| {
        let join_ref = open_inner.make_ref();
        open_inner.send(&PhoenixMessage::join(
            &open_inner.topic,
            &open_inner.table,
            &open_inner.access_token,
            &join_ref,
        ));
        *open_inner.join_ref.borrow_mut() = join_ref;

        let beat_inner = Rc::clone(&open_inner);
        let interval = gloo_timers::callback::Interval::new(HEARTBEAT_INTERVAL_MS, move || {
            let msg_ref = beat_inner.make_ref();
            beat_inner.send(&PhoenixMessage::heartbeat(&msg_ref));
        });
        *open_inner.heartbeat.borrow_mut() = Some(interval);
    }) as Box<dyn FnMut(JsValue)>);
    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    on_open.forget();

    // On message
    let message_inner = Rc::clone(inner);
    let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(text) = event.data().dyn_into::<js_sys::JsString>() {
            let text: String = text.into();
            handle_frame(&message_inner, &text);
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    on_message.forget();

    // On close
    let close_inner = Rc::clone(inner);
    let on_close = Closure::wrap(Box::new(move |event: CloseEvent| {
        web_sys::console::log_1(
            &format!("Realtime closed: code={}, reason={}", event.code(), event.reason()).into(),
        );
        close_inner.heartbeat.borrow_mut().take();
        close_inner.state.live.set(false);

        let reconnect = close_inner.lifecycle.borrow_mut().lost();
        if reconnect {
            schedule_reconnect(&close_inner);
        }
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
    on_close.forget();

    // On error
    let on_error = Closure::wrap(Box::new(move |e: JsValue| {
        web_sys::console::error_1(&format!("Realtime error: {:?}", e).into());
    }) as Box<dyn FnMut(JsValue)>);
    ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    on_error.forget();
}

fn handle_frame(inner: &Rc<Inner>, text: &str) {
    let inbound = match PhoenixMessage::decode(text).and_then(PhoenixMessage::classify) {
        Ok(inbound) => inbound,
        Err(e) => {
            web_sys::console::warn_1(&format!("Skipping malformed frame: {}", e).into());
            return;
        }
    };

    match inbound {
        Inbound::Reply {
            topic,
            msg_ref,
            ok,
            response,
        } if topic == inner.topic && msg_ref.as_deref() == Some(inner.join_ref.borrow().as_str()) => {
            if ok {
                inner.reconnect_attempts.set(0);
                let close_now = inner.lifecycle.borrow_mut().joined();
                if close_now {
                    leave(inner);
                } else {
                    inner.state.live.set(true);
                    web_sys::console::log_1(&format!("Joined {}", inner.topic).into());
                }
            } else {
                let reason = Inbound::rejection_reason(&response);
                web_sys::console::error_1(&format!("Realtime join rejected: {}", reason).into());
                inner.lifecycle.borrow_mut().rejected();
                inner.state.show_error(&format!("Realtime: {}", reason));
                inner.close_socket();
            }
        }
        Inbound::Change(event) => {
            let kind = event.kind();
            let applied = inner.state.apply(event);
            web_sys::console::log_1(&format!("Change received: {} ({:?})", kind, applied).into());
        }
        Inbound::Closed { topic } | Inbound::ChannelError { topic, .. } if topic == inner.topic => {
            web_sys::console::warn_1(&format!("Channel {} closed by server", topic).into());
            inner.close_socket();
        }
        Inbound::System { ok: false, message } => {
            web_sys::console::warn_1(&format!("Realtime system error: {}", message).into());
        }
        _ => {}
    }
}

fn leave(inner: &Rc<Inner>) {
    let msg_ref = inner.make_ref();
    let join_ref = inner.join_ref.borrow().clone();
    inner.send(&PhoenixMessage::leave(&inner.topic, &msg_ref, Some(&join_ref)));
    inner.close_socket();
    inner.state.live.set(false);
}

fn schedule_reconnect(inner: &Rc<Inner>) {
    let attempts = inner.reconnect_attempts.get();
    if attempts >= MAX_RECONNECT_ATTEMPTS {
        web_sys::console::error_1(&"Max reconnect attempts reached".into());
        inner.lifecycle.borrow_mut().rejected();
        return;
    }

    let delay = reconnect_delay_ms(attempts);
    inner.reconnect_attempts.set(attempts + 1);

    let retry_inner = Rc::clone(inner);
    gloo_timers::callback::Timeout::new(delay, move || {
        if !retry_inner.lifecycle.borrow_mut().retry() {
            return;
        }
        web_sys::console::log_1(
            &format!("Attempting reconnect (attempt {})", retry_inner.reconnect_attempts.get()).into(),
        );
        open_socket(&retry_inner);
    })
    .forget();
}

/// Subscribe once the initial read is done, close on cleanup
pub fn init_realtime(state: GlobalState, settings: SupabaseSettings, slot: SubscriptionSlot<RealtimeChannel>) {
    if !settings.is_configured() {
        return;
    }
    slot.fill(RealtimeChannel::connect(&settings, state));
}
