// Browser binding for `ClientState`. The page owns the WebSocket, the speech APIs and the
// REST calls; it forwards their events here and executes the commands polled back out.
// Commands and views cross the boundary as JSON strings.

pub mod web_error_handling;

use std::str::FromStr;

use instant::Instant;
use serde::Serialize;
use serde_json::json;
use wasm_bindgen::prelude::*;

use voice_chess::api::{
    ReviewAnswerResponse, ReviewCompleteResponse, ReviewSkipResponse, ReviewStartResponse,
    SessionToken, TrainingCompleteResponse, TrainingMoveResponse, TrainingStartResponse,
};
use voice_chess::altered_board::MoveInputResult;
use voice_chess::chat::ChatMessageId;
use voice_chess::client::{ClientState, EventError, NotableEvent, SessionKind};
use voice_chess::connection::{ChannelId, ConnectionCommand, ConnectionState};
use voice_chess::coord::Coord;
use voice_chess::force::Force;
use voice_chess::voice::{
    RecognitionErrorKind, SpeechRequestId, VoiceCommand, VoiceSettings, VoiceTurnState,
};
use web_error_handling::JsResult;


#[wasm_bindgen]
pub struct JsEventNoop {}  // in contrast to `null`, indicates that event list is not over

#[wasm_bindgen]
pub struct JsEventGameStateUpdated {}

#[wasm_bindgen]
pub struct JsEventMoveConfirmed {}

#[wasm_bindgen(getter_with_clone)]
pub struct JsEventMoveRejected {
    pub reason: String,
}

#[wasm_bindgen]
pub struct JsEventUndoApplied {}

#[wasm_bindgen]
pub struct JsEventAssistantMessage {}

#[wasm_bindgen(getter_with_clone)]
pub struct JsEventGameOver {
    pub outcome: String,
    pub message: String,
}

#[derive(Serialize)]
struct SelectionView {
    from: String,
    destinations: Vec<String>,
}

#[derive(Serialize)]
struct BoardView {
    fen: String,
    player_color: Force,
    is_my_turn: bool,
    pending: bool,
    selection: Option<SelectionView>,
    last_move: Option<(String, String)>,
    history: Vec<String>,
    is_check: bool,
    game_over: Option<String>,
}

#[derive(Serialize)]
struct StatusView {
    connection: ConnectionState,
    voice: VoiceTurnState,
    ai_thinking: bool,
    always_on: bool,
    transcript: String,
}

fn parse_square(square: &str) -> JsResult<Coord> {
    Coord::from_algebraic(square).ok_or_else(|| rust_error!("Invalid square: {square}"))
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> JsResult<T> {
    serde_json::from_str(text).map_err(|err| rust_error!("Cannot parse response: {err}"))
}

fn to_json(value: &impl Serialize) -> JsResult<String> {
    serde_json::to_string(value).map_err(|err| rust_error!("{err}"))
}

fn event_error(err: EventError) -> JsValue {
    match err {
        EventError::ServerReturnedError(message) => rust_error!("Server error: {message}"),
        EventError::CannotApplyEvent(message) => rust_error!("{message}"),
    }
}

// Error text for the info line; `None` if the input was accepted.
fn input_error(result: MoveInputResult) -> Option<String> {
    match result {
        MoveInputResult::Move(_) | MoveInputResult::Noop => None,
        MoveInputResult::Error(err) => Some(format!("{err:?}")),
    }
}

#[wasm_bindgen]
pub struct WebClient {
    state: ClientState,
}

#[wasm_bindgen]
impl WebClient {
    // `voice_settings` is a JSON-serialized `VoiceSettings`, e.g. restored from local storage.
    pub fn new_client(voice_settings: Option<String>) -> JsResult<WebClient> {
        let settings = match voice_settings {
            Some(text) => parse_json(&text)?,
            None => VoiceSettings::default(),
        };
        Ok(WebClient { state: ClientState::new(settings) })
    }

    pub fn open_game(&mut self, session_id: String) -> u64 {
        self.state.open_session(SessionKind::Game, session_id).generation
    }
    pub fn open_training(&mut self, opening_id: String) -> u64 {
        self.state.open_session(SessionKind::Training, opening_id).generation
    }
    pub fn open_review(&mut self) -> u64 {
        self.state.open_session(SessionKind::Review, "review".to_owned()).generation
    }
    pub fn close_session(&mut self) { self.state.close_session(); }

    pub fn voice_settings(&self) -> JsResult<String> { to_json(self.state.voice().settings()) }

    // Connection.

    pub fn next_connection_command(&mut self) -> Option<String> {
        let command = match self.state.next_connection_command()? {
            ConnectionCommand::Open { channel, session_id } => json!({
                "type": "open",
                "channel": channel.to_raw(),
                "path": format!("/ws/{session_id}"),
            }),
            ConnectionCommand::Send { channel, text } => json!({
                "type": "send",
                "channel": channel.to_raw(),
                "text": text,
            }),
            ConnectionCommand::Close { channel } => json!({
                "type": "close",
                "channel": channel.to_raw(),
            }),
        };
        Some(command.to_string())
    }

    pub fn on_channel_open(&mut self, channel: f64) {
        self.state.on_channel_open(ChannelId::from_raw(channel as u64));
    }
    pub fn on_channel_close(&mut self, channel: f64) {
        self.state.on_channel_close(ChannelId::from_raw(channel as u64), Instant::now());
    }
    pub fn on_channel_message(&mut self, channel: f64, text: &str) -> JsResult<JsValue> {
        let event = self
            .state
            .on_channel_message(ChannelId::from_raw(channel as u64), text)
            .map_err(event_error)?;
        Ok(match event {
            NotableEvent::None => JsEventNoop {}.into(),
            NotableEvent::GameStateUpdated => JsEventGameStateUpdated {}.into(),
            NotableEvent::MoveConfirmed => JsEventMoveConfirmed {}.into(),
            NotableEvent::MoveRejected(reason) => JsEventMoveRejected { reason }.into(),
            NotableEvent::UndoApplied => JsEventUndoApplied {}.into(),
            NotableEvent::AssistantMessage(_) => JsEventAssistantMessage {}.into(),
            NotableEvent::GameOver(notice) => JsEventGameOver {
                outcome: format!("{:?}", notice.outcome).to_lowercase(),
                message: notice.message,
            }
            .into(),
        })
    }

    pub fn refresh(&mut self) { self.state.refresh(Instant::now()); }

    // Board input.

    pub fn click_square(&mut self, square: &str) -> JsResult<Option<String>> {
        Ok(input_error(self.state.click_square(parse_square(square)?)))
    }
    pub fn start_drag(&mut self, square: &str) -> JsResult<Option<String>> {
        Ok(self.state.start_drag(parse_square(square)?).err().map(|err| format!("{err:?}")))
    }
    pub fn drag_drop(&mut self, square: &str) -> JsResult<Option<String>> {
        Ok(input_error(self.state.drag_drop(parse_square(square)?)))
    }
    pub fn abort_drag(&mut self) { self.state.abort_drag(); }
    pub fn make_move(&mut self, from: &str, to: &str) -> JsResult<Option<String>> {
        Ok(input_error(self.state.make_move(parse_square(from)?, parse_square(to)?)))
    }

    pub fn request_undo(&mut self) { self.state.request_undo(); }
    pub fn resign(&mut self) { self.state.resign(); }
    pub fn new_game(&mut self, color: &str, model: Option<String>) -> JsResult<()> {
        let force = Force::from_str(color).map_err(|_| rust_error!("Invalid color: {color}"))?;
        self.state.new_game(force, model);
        Ok(())
    }

    // Chat.

    pub fn send_chat(&mut self, text: &str) -> bool { self.state.send_chat(text).is_some() }

    // Messages added after `last_id` as a JSON array. Pass the id of the last rendered message.
    pub fn chat_messages_after(&self, last_id: Option<f64>) -> JsResult<String> {
        let after = last_id.map(|id| ChatMessageId::from_raw(id as u64));
        to_json(&self.state.chat().messages_after(after))
    }

    // Voice.

    pub fn start_listening(&mut self) -> bool { self.state.start_listening() }
    pub fn stop_listening(&mut self) { self.state.stop_listening(); }
    pub fn set_always_on(&mut self, enabled: bool) -> bool { self.state.set_always_on(enabled) }
    pub fn set_voice_output(&mut self, enabled: bool) { self.state.set_voice_output(enabled); }
    pub fn set_voice(&mut self, voice: String, rate_percent: i32) {
        self.state.set_voice(voice, rate_percent);
    }
    pub fn skip_speech(&mut self) { self.state.skip_speech(); }

    pub fn on_recognition_result(&mut self, text: &str, is_final: bool) {
        self.state.on_recognition_result(text, is_final, Instant::now());
    }
    pub fn on_recognition_ended(&mut self) { self.state.on_recognition_ended(Instant::now()); }
    // `kind` is the `error` field of the recognition error event, e.g. "not-allowed".
    pub fn on_recognition_error(&mut self, kind: &str) {
        let kind = RecognitionErrorKind::from_str(kind)
            .unwrap_or_else(|_| RecognitionErrorKind::Other(kind.to_owned()));
        self.state.on_recognition_error(kind);
    }
    pub fn on_playback_finished(&mut self, id: f64) {
        self.state.on_playback_finished(SpeechRequestId::from_raw(id as u64));
    }
    pub fn on_playback_failed(&mut self, id: f64, reason: &str) {
        self.state.on_playback_failed(SpeechRequestId::from_raw(id as u64), reason);
    }

    pub fn next_voice_command(&mut self) -> Option<String> {
        let command = match self.state.next_voice_command()? {
            VoiceCommand::StartRecognition => json!({ "type": "start_recognition" }),
            VoiceCommand::StopRecognition => json!({ "type": "stop_recognition" }),
            VoiceCommand::Speak { id, text, voice, rate } => json!({
                "type": "speak",
                "id": id.to_raw(),
                "text": text,
                "voice": voice,
                "rate": rate,
            }),
            VoiceCommand::StopPlayback => json!({ "type": "stop_playback" }),
        };
        Some(command.to_string())
    }

    // Views. The `*_changed` checks reset the dirty flags, so call them once per frame.

    pub fn board_changed(&self) -> bool {
        let store = self.state.store();
        // Non-short-circuiting: every flag must be reset.
        store.board().take_dirt()
            | store.overlay().take_dirt()
            | store.selection().take_dirt()
            | store.last_move().take_dirt()
            | store.history().take_dirt()
            | store.game_over_notice().take_dirt()
    }

    pub fn status_changed(&self) -> bool {
        let store = self.state.store();
        store.connection().take_dirt() | store.voice().take_dirt() | store.ai_thinking().take_dirt()
    }

    pub fn board_view(&self) -> JsResult<String> {
        let store = self.state.store();
        let selection = (**store.selection()).as_ref().map(|s| SelectionView {
            from: s.from.to_algebraic(),
            destinations: s.destinations.iter().map(|c| c.to_algebraic()).collect(),
        });
        to_json(&BoardView {
            fen: store.displayed_position().to_fen(),
            player_color: **store.player_force(),
            is_my_turn: **store.is_my_turn(),
            pending: store.overlay().is_some(),
            selection,
            last_move: (**store.last_move()).map(|m| (m.from.to_algebraic(), m.to.to_algebraic())),
            history: store.history().iter().map(|entry| entry.notation.clone()).collect(),
            is_check: store.board().is_check(),
            game_over: (**store.game_over_notice()).as_ref().map(|n| n.message.clone()),
        })
    }

    pub fn status_view(&self) -> JsResult<String> {
        let store = self.state.store();
        let voice = self.state.voice();
        to_json(&StatusView {
            connection: **store.connection(),
            voice: **store.voice(),
            ai_thinking: **store.ai_thinking(),
            always_on: voice.is_always_on(),
            transcript: voice.pending_transcript(),
        })
    }

    // Drills. REST responses are passed in as received, together with the generation
    // returned by `open_*` when the request was made.

    pub fn apply_training_start(&mut self, generation: u64, response: &str) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: TrainingStartResponse = parse_json(response)?;
        self.state.apply_training_start(&token, response).map_err(event_error)
    }
    pub fn apply_training_move(&mut self, generation: u64, response: &str) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: TrainingMoveResponse = parse_json(response)?;
        self.state.apply_training_move(&token, response).map_err(event_error)
    }
    pub fn apply_training_complete(&mut self, generation: u64, response: &str) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: TrainingCompleteResponse = parse_json(response)?;
        self.state.apply_training_complete(&token, &response);
        Ok(())
    }
    pub fn training_view(&self) -> JsResult<Option<String>> {
        let Some(training) = self.state.training() else {
            return Ok(None);
        };
        let view = json!({
            "session_id": training.session_id(),
            "opening": training.opening(),
            "fen": training.board().fen(),
            "player_color": training.player_force(),
            "progress": training.progress(),
            "accuracy": training.accuracy(),
            "hint": training.hint_text(),
            "is_complete": training.is_complete(),
        });
        Ok(Some(view.to_string()))
    }

    pub fn apply_review_start(&mut self, generation: u64, response: &str) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: ReviewStartResponse = parse_json(response)?;
        self.state.apply_review_start(&token, response);
        Ok(())
    }
    pub fn apply_review_answer(
        &mut self, generation: u64, answer: &str, response: &str,
    ) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: ReviewAnswerResponse = parse_json(response)?;
        self.state.apply_review_answer(&token, answer, response).map_err(event_error)
    }
    pub fn apply_review_skip(&mut self, generation: u64, response: &str) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: ReviewSkipResponse = parse_json(response)?;
        self.state.apply_review_skip(&token, response);
        Ok(())
    }
    pub fn apply_review_complete(&mut self, generation: u64, response: &str) -> JsResult<()> {
        let token = self.token(generation)?;
        let response: ReviewCompleteResponse = parse_json(response)?;
        self.state.apply_review_complete(&token, &response);
        Ok(())
    }
    pub fn review_view(&self) -> JsResult<Option<String>> {
        let Some(review) = self.state.review() else {
            return Ok(None);
        };
        let view = json!({
            "session_id": review.session_id(),
            "card": review.current_card(),
            "total_cards": review.total_cards(),
            "progress": review.progress(),
            "correct": review.correct_count(),
            "incorrect": review.incorrect_count(),
            "skipped": review.skipped_count(),
            "is_complete": review.is_complete(),
        });
        Ok(Some(view.to_string()))
    }
}

impl WebClient {
    // Token for a response requested under `generation`. Only the generation tells sessions
    // apart: the page cannot hold on to a `SessionToken`.
    fn token(&self, generation: u64) -> JsResult<SessionToken> {
        let current = self.state.session_token().ok_or_else(|| rust_error!("No active session"))?;
        Ok(SessionToken { session_id: current.session_id, generation })
    }
}

#[wasm_bindgen]
pub fn init_page() { web_error_handling::set_panic_hook(); }
