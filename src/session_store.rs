// Reactive state of the active game screen. Each value is an independent `Observable`, so a
// view can subscribe to exactly what it renders. Values are written only by the components
// inside this crate (see `client::ClientState`); the outside world reads and subscribes.

use crate::altered_board::{LastMove, MoveHistoryEntry, Selection};
use crate::connection::ConnectionState;
use crate::force::Force;
use crate::game_state::{BoardState, GameOutcome};
use crate::observable::{ListenerId, Observable};
use crate::rules::Position;
use crate::voice::VoiceTurnState;


#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameOverNotice {
    pub outcome: GameOutcome,
    pub message: String,
}

#[derive(Debug)]
pub struct SessionStore {
    // Inputs of `is_my_turn`. Private so that the derived value cannot go stale.
    player_force: Observable<Force>,
    board: Observable<BoardState>,
    is_my_turn: Observable<bool>,

    pub(crate) overlay: Observable<Option<Position>>,
    pub(crate) selection: Observable<Option<Selection>>,
    pub(crate) last_move: Observable<Option<LastMove>>,
    pub(crate) history: Observable<Vec<MoveHistoryEntry>>,
    pub(crate) connection: Observable<ConnectionState>,
    pub(crate) voice: Observable<VoiceTurnState>,
    pub(crate) ai_thinking: Observable<bool>,
    pub(crate) game_over_notice: Observable<Option<GameOverNotice>>,
}

macro_rules! observable_accessors {
    ($($field:ident, $subscribe:ident: $t:ty;)*) => {
        $(
            pub fn $field(&self) -> &Observable<$t> { &self.$field }
            pub fn $subscribe(&mut self, listener: impl FnMut(&$t) + 'static) -> ListenerId {
                self.$field.subscribe(listener)
            }
        )*
    };
}

impl SessionStore {
    pub fn new() -> Self {
        let player_force = Force::White;
        let board = BoardState::start();
        let is_my_turn = board.active_force() == player_force;
        SessionStore {
            player_force: Observable::new(player_force),
            board: Observable::new(board),
            is_my_turn: Observable::new(is_my_turn),
            overlay: Observable::new(None),
            selection: Observable::new(None),
            last_move: Observable::new(None),
            history: Observable::new(Vec::new()),
            connection: Observable::new(ConnectionState::Disconnected),
            voice: Observable::new(VoiceTurnState::Idle),
            ai_thinking: Observable::new(false),
            game_over_notice: Observable::new(None),
        }
    }

    observable_accessors! {
        player_force, subscribe_player_force: Force;
        board, subscribe_board: BoardState;
        is_my_turn, subscribe_is_my_turn: bool;
        overlay, subscribe_overlay: Option<Position>;
        selection, subscribe_selection: Option<Selection>;
        last_move, subscribe_last_move: Option<LastMove>;
        history, subscribe_history: Vec<MoveHistoryEntry>;
        connection, subscribe_connection: ConnectionState;
        voice, subscribe_voice: VoiceTurnState;
        ai_thinking, subscribe_ai_thinking: bool;
        game_over_notice, subscribe_game_over_notice: Option<GameOverNotice>;
    }

    // What the board view should show: the provisional position if there is one.
    pub fn displayed_position(&self) -> &Position {
        match &*self.overlay {
            Some(position) => position,
            None => self.board.position(),
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.board.is_game_over() || self.game_over_notice.is_some()
    }

    pub(crate) fn set_player_force(&mut self, force: Force) {
        self.player_force.set(force);
        self.update_is_my_turn();
    }

    // Replaces the authoritative board as a whole.
    pub(crate) fn set_board(&mut self, board: BoardState) {
        self.board.set(board);
        self.update_is_my_turn();
    }

    // Prepares for a new game on the same screen.
    pub(crate) fn reset_game(&mut self, player_force: Force) {
        self.player_force.set(player_force);
        self.board.set(BoardState::start());
        self.update_is_my_turn();
        self.overlay.set(None);
        self.selection.set(None);
        self.last_move.set(None);
        self.history.set(Vec::new());
        self.ai_thinking.set(false);
        self.game_over_notice.set(None);
    }

    // Restores initial values. Listeners stay subscribed and are notified about every value
    // that actually changes.
    pub fn reset_session(&mut self) {
        self.reset_game(Force::White);
        self.connection.set(ConnectionState::Disconnected);
        self.voice.set(VoiceTurnState::Idle);
    }

    fn update_is_my_turn(&mut self) {
        let is_my_turn = self.board.active_force() == *self.player_force;
        self.is_my_turn.set(is_my_turn);
    }
}

impl Default for SessionStore {
    fn default() -> Self { Self::new() }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::test_util::snapshot_after;

    #[test]
    fn is_my_turn_follows_both_inputs() {
        let mut store = SessionStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        store.subscribe_is_my_turn(move |v| seen_clone.borrow_mut().push(*v));
        assert!(**store.is_my_turn());

        store.set_player_force(Force::Black);
        assert!(!**store.is_my_turn());

        let board = BoardState::from_snapshot(snapshot_after(&["e2e4"]), Force::Black).unwrap();
        store.set_board(board);
        assert!(**store.is_my_turn());
        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn reset_restores_initial_values() {
        let mut store = SessionStore::new();
        store.set_player_force(Force::Black);
        store.ai_thinking.set(true);
        store.voice.set(VoiceTurnState::Speaking);
        store.history.update(|h| {
            h.push(MoveHistoryEntry {
                notation: "e4".to_owned(),
                from: None,
                to: None,
                by_player: true,
            })
        });
        store.reset_session();
        assert_eq!(**store.player_force(), Force::White);
        assert!(**store.is_my_turn());
        assert!(!**store.ai_thinking());
        assert_eq!(**store.voice(), VoiceTurnState::Idle);
        assert!(store.history().is_empty());
        assert_eq!(*store.board().position(), Position::start());
    }
}
