// Connection manager for the game channel. It does not own a socket: it tells the driver
// when to open and close one (`ConnectionCommand`) and is told back what happened
// (`on_open`, `on_close`, incoming text). Every socket gets a `ChannelId`, so callbacks from
// a socket that has already been replaced or torn down are recognized and ignored.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use instant::Instant;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::event::{ClientEvent, ServerEvent};
use crate::util::truncate_chars;


pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

const MAX_LOGGED_PAYLOAD_CHARS: usize = 200;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChannelId(u64);

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConnectionCommand {
    // Open a channel to the game endpoint of the session.
    Open { channel: ChannelId, session_id: String },
    // Transmit a text frame. Only issued while the channel is open.
    Send { channel: ChannelId, text: String },
    // Close the channel. No `on_close` is expected afterwards.
    Close { channel: ChannelId },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DecodeError {
    pub payload: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct ConnectionManager {
    session_id: Option<String>,
    state: ConnectionState,
    channel: Option<ChannelId>,
    next_channel_id: u64,
    reconnect_at: Option<Instant>,
    latest_ping: Option<Instant>,
    commands: VecDeque<ConnectionCommand>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        ConnectionManager {
            session_id: None,
            state: ConnectionState::Disconnected,
            channel: None,
            next_channel_id: 0,
            reconnect_at: None,
            latest_ping: None,
            commands: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState { self.state }
    pub fn session_id(&self) -> Option<&str> { self.session_id.as_deref() }
    pub fn current_channel(&self) -> Option<ChannelId> { self.channel }
    pub fn reconnect_at(&self) -> Option<Instant> { self.reconnect_at }

    // Opens a channel scoped to the session, replacing any previous one.
    pub fn connect(&mut self, session_id: String) {
        self.close_channel();
        self.reconnect_at = None;
        info!("Connecting to game {session_id}");
        self.session_id = Some(session_id);
        self.open_channel();
    }

    pub fn on_open(&mut self, channel: ChannelId) -> bool {
        if self.channel != Some(channel) {
            debug!("Ignoring open of stale channel {channel:?}");
            return false;
        }
        info!("Game channel open");
        self.state = ConnectionState::Connected;
        self.latest_ping = None;
        true
    }

    // Handles both clean and erroneous closing. Schedules a reconnect.
    pub fn on_close(&mut self, channel: ChannelId, now: Instant) -> bool {
        if self.channel != Some(channel) {
            debug!("Ignoring close of stale channel {channel:?}");
            return false;
        }
        warn!("Game channel closed, reconnecting in {RECONNECT_DELAY:?}");
        self.channel = None;
        self.state = ConnectionState::Disconnected;
        self.reconnect_at = Some(now + RECONNECT_DELAY);
        true
    }

    // Fire-and-forget: while the channel is not open, the event is dropped.
    pub fn send(&mut self, event: &ClientEvent) -> bool {
        let channel = match (self.state, self.channel) {
            (ConnectionState::Connected, Some(channel)) => channel,
            _ => {
                debug!("Not connected, dropping {event:?}");
                return false;
            }
        };
        match serde_json::to_string(event) {
            Ok(text) => {
                self.commands.push_back(ConnectionCommand::Send { channel, text });
                true
            }
            Err(err) => {
                warn!("Cannot serialize {event:?}: {err}");
                false
            }
        }
    }

    // Decodes a frame from the given channel. Frames from stale channels yield `None`.
    pub fn receive(
        &mut self, channel: ChannelId, text: &str,
    ) -> Option<Result<ServerEvent, DecodeError>> {
        if self.channel != Some(channel) {
            debug!("Ignoring frame from stale channel {channel:?}");
            return None;
        }
        Some(decode(text))
    }

    // Fires the reconnect timer and the keep-alive ping.
    pub fn refresh(&mut self, now: Instant) {
        if let Some(reconnect_at) = self.reconnect_at {
            if now >= reconnect_at {
                self.reconnect_at = None;
                self.open_channel();
            }
        }
        if self.state == ConnectionState::Connected {
            let ping_due = match self.latest_ping {
                None => {
                    self.latest_ping = Some(now);
                    false
                }
                Some(t) => now.saturating_duration_since(t) >= PING_INTERVAL,
            };
            if ping_due {
                self.latest_ping = Some(now);
                self.send(&ClientEvent::Ping);
            }
        }
    }

    // Leaves the session for good: cancels a pending reconnect and closes the channel.
    pub fn teardown(&mut self) {
        info!("Tearing down game channel");
        self.reconnect_at = None;
        self.close_channel();
        self.session_id = None;
    }

    pub fn next_command(&mut self) -> Option<ConnectionCommand> { self.commands.pop_front() }

    fn open_channel(&mut self) {
        let Some(session_id) = self.session_id.clone() else {
            return;
        };
        let channel = ChannelId(self.next_channel_id);
        self.next_channel_id += 1;
        self.channel = Some(channel);
        self.state = ConnectionState::Connecting;
        self.commands.push_back(ConnectionCommand::Open { channel, session_id });
    }

    fn close_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.commands.push_back(ConnectionCommand::Close { channel });
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self { Self::new() }
}

pub fn decode(text: &str) -> Result<ServerEvent, DecodeError> {
    serde_json::from_str(text).map_err(|err| DecodeError {
        payload: truncate_chars(text, MAX_LOGGED_PAYLOAD_CHARS).to_owned(),
        reason: err.to_string(),
    })
}

impl ChannelId {
    // For drivers that need to carry the id through an untyped boundary.
    pub fn to_raw(self) -> u64 { self.0 }
    pub fn from_raw(raw: u64) -> Self { ChannelId(raw) }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot decode \"{}\": {}", self.payload, self.reason)
    }
}
