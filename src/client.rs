// `ClientState` is the context of the active screen. It is constructed explicitly, owns every
// component (store, board, connection, voice, chat, drill sessions) and is the only place
// where they meet. A driver (console client, browser page) feeds it events from the outside
// world together with the current time, and executes the commands it produces.
//
// Nothing here fails loudly. Errors are turned into a log line, a system chat message, or a
// state update right where they happen; `EventError` is returned for the driver to log.

use instant::Instant;
use log::{debug, info, warn};

use crate::altered_board::{AlteredBoard, MoveInputResult, ReconcileError, TurnError};
use crate::api::{
    ReviewAnswerResponse, ReviewCompleteResponse, ReviewSkipResponse, ReviewStartResponse,
    SessionToken, TrainingCompleteResponse, TrainingMoveResponse, TrainingStartResponse,
};
use crate::chat::{ChatLog, ChatMessageId, ChatRole};
use crate::connection::{ChannelId, ConnectionCommand, ConnectionManager};
use crate::coord::Coord;
use crate::event::{AiResponsePayload, ClientEvent, GameOverPayload, ServerEvent};
use crate::force::Force;
use crate::game_state::GameOutcome;
use crate::review::ReviewSession;
use crate::session_store::{GameOverNotice, SessionStore};
use crate::training::{TrainingMoveOutcome, TrainingSession};
use crate::utc_time::UtcDateTime;
use crate::voice::{
    RecognitionErrorKind, SpeechRequestId, VoiceCommand, VoiceController, VoiceNotice,
    VoiceSettings,
};


pub const PERMISSION_DENIED_MESSAGE: &str =
    "Microphone access was denied. Voice input is off; you can still type.";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SessionKind {
    Game,
    Training,
    Review,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NotableEvent {
    None,
    GameStateUpdated,
    MoveConfirmed,
    MoveRejected(String),
    UndoApplied,
    AssistantMessage(ChatMessageId),
    GameOver(GameOverNotice),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventError {
    ServerReturnedError(String),
    CannotApplyEvent(String),
}

#[derive(Debug)]
struct ActiveSession {
    kind: SessionKind,
    token: SessionToken,
}

#[derive(Debug)]
pub struct ClientState {
    session: Option<ActiveSession>,
    next_generation: u64,
    store: SessionStore,
    alt_board: AlteredBoard,
    connection: ConnectionManager,
    voice: VoiceController,
    chat: ChatLog,
    training: Option<TrainingSession>,
    review: Option<ReviewSession>,
}

impl ClientState {
    pub fn new(voice_settings: VoiceSettings) -> Self {
        ClientState {
            session: None,
            next_generation: 0,
            store: SessionStore::new(),
            alt_board: AlteredBoard::new(),
            connection: ConnectionManager::new(),
            voice: VoiceController::new(voice_settings),
            chat: ChatLog::new(),
            training: None,
            review: None,
        }
    }

    pub fn store(&self) -> &SessionStore { &self.store }
    // For subscribing. Values can only be changed through `ClientState`.
    pub fn store_mut(&mut self) -> &mut SessionStore { &mut self.store }
    pub fn chat(&self) -> &ChatLog { &self.chat }
    pub fn voice(&self) -> &VoiceController { &self.voice }
    pub fn connection(&self) -> &ConnectionManager { &self.connection }
    pub fn training(&self) -> Option<&TrainingSession> { self.training.as_ref() }
    pub fn review(&self) -> Option<&ReviewSession> { self.review.as_ref() }

    pub fn session_kind(&self) -> Option<SessionKind> { self.session.as_ref().map(|s| s.kind) }
    pub fn session_token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|s| s.token.clone())
    }
    // Whether a fetch issued with `token` may still be applied.
    pub fn is_current(&self, token: &SessionToken) -> bool {
        self.session.as_ref().is_some_and(|s| s.token == *token)
    }

    // Enters a screen. Any previous screen is torn down first. Only game sessions open the
    // game channel.
    pub fn open_session(&mut self, kind: SessionKind, session_id: String) -> SessionToken {
        self.close_session();
        let token = SessionToken {
            session_id: session_id.clone(),
            generation: self.next_generation,
        };
        self.next_generation += 1;
        info!("Opening {kind:?} session {session_id}");
        self.session = Some(ActiveSession { kind, token: token.clone() });
        if kind == SessionKind::Game {
            self.connection.connect(session_id);
        }
        self.voice.activate();
        self.sync_store();
        token
    }

    // Leaves the screen: cancels timers, stops audio, closes the channel for good and
    // restores the store.
    pub fn close_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!("Closing {:?} session {}", session.kind, session.token.session_id);
        let voice_settings = self.voice.settings().clone();
        self.connection.teardown();
        self.voice.teardown();
        // Teardown switches always-on off; the next screen starts with the user's choice.
        self.voice.restore_settings(voice_settings);
        self.alt_board.reset();
        self.store.reset_session();
        self.chat.clear();
        self.training = None;
        self.review = None;
    }

    pub fn next_connection_command(&mut self) -> Option<ConnectionCommand> {
        self.connection.next_command()
    }
    pub fn next_voice_command(&mut self) -> Option<VoiceCommand> { self.voice.next_command() }

    // Time-driven work: reconnect attempts, keep-alive and the silence timer.
    pub fn refresh(&mut self, now: Instant) {
        self.connection.refresh(now);
        self.voice.refresh(now);
        self.process_voice_notices();
        self.sync_store();
    }

    pub fn on_channel_open(&mut self, channel: ChannelId) {
        if self.connection.on_open(channel) {
            // The server might have moved on while we were away.
            self.connection.send(&ClientEvent::GetState);
        }
        self.sync_store();
    }

    pub fn on_channel_close(&mut self, channel: ChannelId, now: Instant) {
        self.connection.on_close(channel, now);
        self.sync_store();
    }

    pub fn on_channel_message(
        &mut self, channel: ChannelId, text: &str,
    ) -> Result<NotableEvent, EventError> {
        match self.connection.receive(channel, text) {
            None => Ok(NotableEvent::None),
            Some(Err(err)) => Err(EventError::CannotApplyEvent(err.to_string())),
            Some(Ok(event)) => self.process_server_event(event),
        }
    }

    pub fn process_server_event(&mut self, event: ServerEvent) -> Result<NotableEvent, EventError> {
        let ret = self.apply_server_event(event);
        self.process_voice_notices();
        self.sync_store();
        ret
    }

    fn apply_server_event(&mut self, event: ServerEvent) -> Result<NotableEvent, EventError> {
        use ServerEvent::*;
        match event {
            GameState { state } => {
                self.alt_board.apply_authoritative(&mut self.store, state).map_err(|err| {
                    EventError::CannotApplyEvent(err.to_string())
                })?;
                Ok(NotableEvent::GameStateUpdated)
            }
            MoveResult(payload) => {
                let result = self.alt_board.on_move_result(&mut self.store, payload.outcome());
                if self.alt_board.needs_authoritative_refresh(&self.store) {
                    self.connection.send(&ClientEvent::GetState);
                }
                match result {
                    Ok(()) => Ok(NotableEvent::MoveConfirmed),
                    Err(ReconcileError::MoveRejected(reason)) => {
                        self.add_system_message(reason.clone());
                        Ok(NotableEvent::MoveRejected(reason))
                    }
                    Err(err) => Err(EventError::CannotApplyEvent(format!("{err:?}"))),
                }
            }
            AiThinking { thinking } => {
                self.alt_board.set_ai_thinking(&mut self.store, thinking);
                self.voice.set_thinking(thinking);
                Ok(NotableEvent::None)
            }
            AiResponse(payload) => Ok(self.apply_ai_response(payload)),
            UndoResult(payload) => {
                match self.alt_board.on_undo_result(&mut self.store, payload.outcome()) {
                    Ok(()) => {
                        if !self.store.board().is_game_over() {
                            self.store.game_over_notice.set(None);
                        }
                        Ok(NotableEvent::UndoApplied)
                    }
                    Err(ReconcileError::UndoRejected) => {
                        self.add_system_message("Nothing to undo.".to_owned());
                        Ok(NotableEvent::None)
                    }
                    Err(err) => Err(EventError::CannotApplyEvent(format!("{err:?}"))),
                }
            }
            GameOver(payload) => self.apply_game_over(payload),
            Error { message } => {
                self.add_system_message(message.clone());
                Err(EventError::ServerReturnedError(format!("Got error from server: {message}")))
            }
            Pong => Ok(NotableEvent::None),
            Unknown => {
                debug!("Ignoring unknown server event");
                Ok(NotableEvent::None)
            }
        }
    }

    fn apply_ai_response(&mut self, payload: AiResponsePayload) -> NotableEvent {
        let AiResponsePayload {
            message,
            notation,
            move_from,
            move_to,
            state,
            blunder_feedback,
        } = payload;
        if let Err(err) = self.alt_board.on_opponent_move(
            &mut self.store,
            notation.clone(),
            move_from,
            move_to,
            state,
        ) {
            // The message is still worth showing; the board keeps its last good state.
            warn!("Cannot apply AI move: {err:?}");
        }
        if let Some(feedback) = blunder_feedback.filter(|f| !f.trim().is_empty()) {
            self.add_system_message(feedback);
        }
        self.voice.speak(&message);
        let id = self.chat.append(ChatRole::Assistant, message, notation, UtcDateTime::now());
        NotableEvent::AssistantMessage(id)
    }

    fn apply_game_over(&mut self, payload: GameOverPayload) -> Result<NotableEvent, EventError> {
        if let Some(state) = payload.state {
            self.alt_board
                .apply_authoritative(&mut self.store, state)
                .map_err(|err| EventError::CannotApplyEvent(err.to_string()))?;
        }
        let my_force = **self.store.player_force();
        let outcome = payload
            .result
            .filter(|r| r.is_determined())
            .or_else(|| {
                payload
                    .result_notation
                    .as_deref()
                    .map(|n| GameOutcome::from_result_notation(n, my_force))
                    .filter(|r| r.is_determined())
            })
            .unwrap_or_else(|| self.store.board().outcome());
        self.store.selection.set(None);
        let message = payload.message.unwrap_or_else(|| outcome.to_readable_string().to_owned());
        let notice = GameOverNotice { outcome, message };
        self.store.game_over_notice.set(Some(notice.clone()));
        self.add_system_message(format!("Game over. {}", notice.message));
        Ok(NotableEvent::GameOver(notice))
    }

    pub fn click_square(&mut self, coord: Coord) -> MoveInputResult {
        let result = self.alt_board.click(&mut self.store, coord);
        self.send_local_move(result)
    }

    pub fn start_drag(&mut self, coord: Coord) -> Result<(), TurnError> {
        self.alt_board.start_drag(&mut self.store, coord)
    }

    pub fn drag_drop(&mut self, coord: Coord) -> MoveInputResult {
        let result = self.alt_board.drag_drop(&mut self.store, coord);
        self.send_local_move(result)
    }

    pub fn abort_drag(&mut self) { self.alt_board.abort_drag(&mut self.store); }

    // Select-then-move in one call, for moves entered as text.
    pub fn make_move(&mut self, from: Coord, to: Coord) -> MoveInputResult {
        self.store.selection.set(None);
        if let MoveInputResult::Error(err) = self.alt_board.click(&mut self.store, from) {
            return MoveInputResult::Error(err);
        }
        let result = self.alt_board.attempt_move(&mut self.store, from, to);
        if result.is_err() {
            self.store.selection.set(None);
        }
        self.send_local_move(result.into())
    }

    fn send_local_move(&mut self, result: MoveInputResult) -> MoveInputResult {
        if let MoveInputResult::Move(mv) = result {
            self.connection.send(&ClientEvent::make_move(mv.from, mv.to, mv.promotion));
        }
        result
    }

    // Sends a chat message typed or spoken by the user. Blank messages are dropped.
    pub fn send_chat(&mut self, text: &str) -> Option<ChatMessageId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = self.chat.append(ChatRole::User, text.to_owned(), None, UtcDateTime::now());
        self.connection.send(&ClientEvent::Chat { message: text.to_owned() });
        Some(id)
    }

    pub fn request_undo(&mut self) {
        self.alt_board.request_undo(&mut self.store);
        self.connection.send(&ClientEvent::Undo);
    }

    pub fn resign(&mut self) { self.connection.send(&ClientEvent::Resign); }

    pub fn new_game(&mut self, player_force: Force, model: Option<String>) {
        self.alt_board.reset();
        self.store.reset_game(player_force);
        self.connection.send(&ClientEvent::NewGame { player_color: player_force, model });
    }

    pub fn add_system_message(&mut self, text: String) -> ChatMessageId {
        self.chat.append(ChatRole::System, text, None, UtcDateTime::now())
    }

    // Voice input and output.

    pub fn start_listening(&mut self) -> bool {
        let ret = self.voice.start_listening();
        self.sync_store();
        ret
    }

    pub fn stop_listening(&mut self) {
        self.voice.stop_listening();
        self.sync_store();
    }

    pub fn set_always_on(&mut self, enabled: bool) -> bool {
        let ret = self.voice.set_always_on(enabled);
        self.sync_store();
        ret
    }

    pub fn set_voice_output(&mut self, enabled: bool) {
        self.voice.set_voice_output(enabled);
        self.sync_store();
    }

    pub fn set_voice(&mut self, voice: String, rate_percent: i32) {
        self.voice.set_voice(voice, rate_percent);
    }

    pub fn skip_speech(&mut self) {
        self.voice.skip();
        self.sync_store();
    }

    pub fn on_recognition_result(&mut self, text: &str, is_final: bool, now: Instant) {
        self.voice.on_recognition_result(text, is_final, now);
        self.sync_store();
    }

    pub fn on_recognition_ended(&mut self, now: Instant) {
        self.voice.on_recognition_ended(now);
        self.sync_store();
    }

    pub fn on_recognition_error(&mut self, kind: RecognitionErrorKind) {
        self.voice.on_recognition_error(kind);
        self.process_voice_notices();
        self.sync_store();
    }

    pub fn on_playback_finished(&mut self, id: SpeechRequestId) {
        self.voice.on_playback_finished(id);
        self.sync_store();
    }

    pub fn on_playback_failed(&mut self, id: SpeechRequestId, reason: &str) {
        self.voice.on_playback_failed(id, reason);
        self.sync_store();
    }

    // Drill sessions. Each result is applied only if the screen that asked for it is still
    // active.

    pub fn apply_training_start(
        &mut self, token: &SessionToken, response: TrainingStartResponse,
    ) -> Result<(), EventError> {
        if !self.accept_fetch(token) {
            return Ok(());
        }
        let session = TrainingSession::start(response)
            .map_err(|err| EventError::CannotApplyEvent(err.to_string()))?;
        if let Some(hint) = session.hint_text() {
            self.add_assistant_message(hint);
        }
        self.training = Some(session);
        Ok(())
    }

    pub fn apply_training_move(
        &mut self, token: &SessionToken, response: TrainingMoveResponse,
    ) -> Result<(), EventError> {
        if !self.accept_fetch(token) {
            return Ok(());
        }
        let Some(training) = self.training.as_mut() else {
            return Err(EventError::CannotApplyEvent("No training in progress".to_owned()));
        };
        let outcome = training
            .apply_move(response)
            .map_err(|err| EventError::CannotApplyEvent(err.to_string()))?;
        let hint = training.hint_text();
        match outcome {
            TrainingMoveOutcome::Correct { message, opponent_move } => {
                self.add_assistant_message(message);
                if let Some(opponent_move) = opponent_move {
                    self.add_system_message(format!("Opponent plays {opponent_move}."));
                }
                if let Some(hint) = hint {
                    self.add_assistant_message(hint);
                }
            }
            TrainingMoveOutcome::Incorrect { message, .. } => self.add_assistant_message(message),
        }
        Ok(())
    }

    pub fn apply_training_complete(
        &mut self, token: &SessionToken, response: &TrainingCompleteResponse,
    ) {
        if !self.accept_fetch(token) {
            return;
        }
        if let Some(training) = self.training.as_mut() {
            training.apply_complete(response);
        }
        self.add_system_message(format!(
            "Training complete: {:.0}% accuracy.",
            response.session_accuracy * 100.0
        ));
    }

    pub fn apply_review_start(&mut self, token: &SessionToken, response: ReviewStartResponse) {
        if !self.accept_fetch(token) {
            return;
        }
        let message = response.message.clone();
        self.review = ReviewSession::start(response);
        if self.review.is_none() {
            self.add_system_message(message.unwrap_or_else(|| "No cards due for review.".to_owned()));
        }
    }

    pub fn apply_review_answer(
        &mut self, token: &SessionToken, answer: &str, response: ReviewAnswerResponse,
    ) -> Result<(), EventError> {
        if !self.accept_fetch(token) {
            return Ok(());
        }
        let Some(review) = self.review.as_mut() else {
            return Err(EventError::CannotApplyEvent("No review in progress".to_owned()));
        };
        let feedback = review.apply_answer(answer, response);
        let text = match (feedback.correct, &feedback.explanation) {
            (true, _) => "Correct!".to_owned(),
            (false, Some(explanation)) => {
                format!("The move was {}. {explanation}", feedback.expected_move)
            }
            (false, None) => format!("The move was {}.", feedback.expected_move),
        };
        self.add_assistant_message(text);
        Ok(())
    }

    pub fn apply_review_skip(&mut self, token: &SessionToken, response: ReviewSkipResponse) {
        if !self.accept_fetch(token) {
            return;
        }
        if let Some(review) = self.review.as_mut() {
            review.apply_skip(response);
        }
    }

    pub fn apply_review_complete(&mut self, token: &SessionToken, response: &ReviewCompleteResponse) {
        if !self.accept_fetch(token) {
            return;
        }
        if let Some(review) = self.review.as_mut() {
            review.apply_complete(response);
        }
        self.add_system_message(format!(
            "Review complete: {} of {} correct.",
            response.correct_count, response.total_reviewed
        ));
    }

    fn accept_fetch(&self, token: &SessionToken) -> bool {
        let current = self.is_current(token);
        if !current {
            debug!("Discarding result for stale session {}", token.session_id);
        }
        current
    }

    fn add_assistant_message(&mut self, text: String) {
        self.voice.speak(&text);
        self.chat.append(ChatRole::Assistant, text, None, UtcDateTime::now());
        self.sync_store();
    }

    fn process_voice_notices(&mut self) {
        while let Some(notice) = self.voice.next_notice() {
            match notice {
                VoiceNotice::TranscriptReady(text) => {
                    self.send_chat(&text);
                }
                VoiceNotice::PermissionDenied => {
                    self.add_system_message(PERMISSION_DENIED_MESSAGE.to_owned());
                }
            }
        }
    }

    fn sync_store(&mut self) {
        self.store.connection.set(self.connection.state());
        self.store.voice.set(self.voice.state());
    }
}
