// Rust-upgrade (https://github.com/rust-lang/rust/issues/46379):
//   remove `#[allow(dead_code)]` before public functions.

use std::time::Duration;

use instant::Instant;
use voice_chess::chat::ChatRole;
use voice_chess::client::{ClientState, EventError, NotableEvent, SessionKind};
use voice_chess::connection::{ChannelId, ConnectionCommand};
use voice_chess::event::ClientEvent;
use voice_chess::force::Force;
use voice_chess::game_state::GameSnapshot;
use voice_chess::test_util::snapshot_for_player;
use voice_chess::voice::{VoiceCommand, VoiceSettings};


// A `ClientState` with a fake game channel and a fake clock. Outgoing frames are decoded
// back into `ClientEvent`s so that tests can assert on them.
pub struct TestClient {
    pub state: ClientState,
    pub t0: Instant,
    open_channel: Option<ChannelId>,
    pending_open: Option<ChannelId>,
    sent: Vec<ClientEvent>,
    voice_commands: Vec<VoiceCommand>,
}

impl TestClient {
    #[allow(dead_code)]
    pub fn new(voice_settings: VoiceSettings) -> Self {
        TestClient {
            state: ClientState::new(voice_settings),
            t0: Instant::now(),
            open_channel: None,
            pending_open: None,
            sent: Vec::new(),
            voice_commands: Vec::new(),
        }
    }

    // Opens a game session, connects and receives the initial position.
    #[allow(dead_code)]
    pub fn in_game(player: Force, voice_settings: VoiceSettings) -> Self {
        let mut client = TestClient::new(voice_settings);
        client.state.open_session(SessionKind::Game, "default".to_owned());
        client.pump();
        assert!(client.accept_connection());
        assert_eq!(client.take_sent(), vec![ClientEvent::GetState]);
        client.server_state(snapshot_for_player(&[], player)).unwrap();
        client.take_voice_commands();
        client
    }

    #[allow(dead_code)]
    pub fn at(&self, millis: u64) -> Instant { self.t0 + Duration::from_millis(millis) }

    // Executes connection and voice commands produced so far.
    #[allow(dead_code)]
    pub fn pump(&mut self) {
        while let Some(command) = self.state.next_connection_command() {
            match command {
                ConnectionCommand::Open { channel, .. } => self.pending_open = Some(channel),
                ConnectionCommand::Send { channel, text } => {
                    assert_eq!(Some(channel), self.open_channel, "send on a closed channel");
                    self.sent.push(serde_json::from_str(&text).unwrap());
                }
                ConnectionCommand::Close { channel } => {
                    if self.open_channel == Some(channel) {
                        self.open_channel = None;
                    }
                    if self.pending_open == Some(channel) {
                        self.pending_open = None;
                    }
                }
            }
        }
        while let Some(command) = self.state.next_voice_command() {
            self.voice_commands.push(command);
        }
    }

    // Completes the pending channel open, if any.
    #[allow(dead_code)]
    pub fn accept_connection(&mut self) -> bool {
        let Some(channel) = self.pending_open.take() else {
            return false;
        };
        self.open_channel = Some(channel);
        self.state.on_channel_open(channel);
        self.pump();
        true
    }

    #[allow(dead_code)]
    pub fn has_pending_connection(&self) -> bool { self.pending_open.is_some() }

    // The server drops the connection.
    #[allow(dead_code)]
    pub fn drop_connection(&mut self, now: Instant) {
        let channel = self.open_channel.take().unwrap();
        self.state.on_channel_close(channel, now);
        self.pump();
    }

    #[allow(dead_code)]
    pub fn refresh(&mut self, now: Instant) {
        self.state.refresh(now);
        self.pump();
    }

    #[allow(dead_code)]
    pub fn server(&mut self, message: serde_json::Value) -> Result<NotableEvent, EventError> {
        let channel = self.open_channel.unwrap();
        let ret = self.state.on_channel_message(channel, &message.to_string());
        self.pump();
        ret
    }

    #[allow(dead_code)]
    pub fn server_raw(&mut self, text: &str) -> Result<NotableEvent, EventError> {
        let channel = self.open_channel.unwrap();
        let ret = self.state.on_channel_message(channel, text);
        self.pump();
        ret
    }

    #[allow(dead_code)]
    pub fn server_state(&mut self, state: GameSnapshot) -> Result<NotableEvent, EventError> {
        self.server(serde_json::json!({ "type": "game_state", "state": state }))
    }

    #[allow(dead_code)]
    pub fn take_sent(&mut self) -> Vec<ClientEvent> {
        self.pump();
        std::mem::take(&mut self.sent)
    }

    #[allow(dead_code)]
    pub fn take_voice_commands(&mut self) -> Vec<VoiceCommand> {
        self.pump();
        std::mem::take(&mut self.voice_commands)
    }

    #[allow(dead_code)]
    pub fn chat_lines(&self) -> Vec<(ChatRole, String)> {
        self.state.chat().messages().iter().map(|m| (m.role, m.text.clone())).collect()
    }
}

#[allow(dead_code)]
pub fn always_on() -> VoiceSettings {
    VoiceSettings {
        always_on: true,
        ..VoiceSettings::default()
    }
}

#[allow(dead_code)]
pub fn voice_off() -> VoiceSettings {
    VoiceSettings {
        voice_output: false,
        ..VoiceSettings::default()
    }
}
