// Defines `AlteredBoard`: the authoritative board from the server plus at most one local
// move that the server has not confirmed yet.
//
// The server is trusted, the user is not. Bogus input (clicking an opponent piece, dropping
// a piece on an unreachable square, trying to move out of turn) must never panic and never
// reach the server. Legality is previewed with the local rules engine, but the server has
// the final word: a confirmed or rejected move is always followed by the server's position,
// which replaces whatever was shown locally.
//
// The local move lives in a separate slot (`SessionStore::overlay`), never inside the
// authoritative `BoardState`. Discarding the overlay therefore always restores the last
// confirmed position.

use log::{debug, warn};

use crate::coord::Coord;
use crate::event::{MoveOutcome, UndoOutcome};
use crate::game_state::{BoardState, GameSnapshot};
use crate::internal_error_message;
use crate::rules::{LocalMove, PositionError};
use crate::session_store::SessionStore;


// Number of history entries removed by undo: the player's move and the reply.
pub const UNDO_HISTORY_ENTRIES: usize = 2;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SelectionSource {
    Click,
    Drag,
}

// Selected piece together with the squares it can go to. The destinations are computed
// once, from the authoritative position, when the piece is selected.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Selection {
    pub from: Coord,
    pub destinations: Vec<Coord>,
    pub source: SelectionSource,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LastMove {
    pub from: Coord,
    pub to: Coord,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MoveHistoryEntry {
    pub notation: String,
    pub from: Option<Coord>,
    pub to: Option<Coord>,
    pub by_player: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TurnError {
    NotMyTurn,
    PieceMissing,
    NotMyPiece,
    IllegalDestination,
    NoMoveInProgress,
    DragInProgress,
    MovePending,
    GameOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveInputResult {
    // A move was applied locally. The caller must send it to the server.
    Move(LocalMove),
    Noop,
    Error(TurnError),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ReconcileError {
    // Reason as reported by the server, verbatim.
    MoveRejected(String),
    UndoRejected,
    BadPosition(PositionError),
}

#[derive(Clone, Copy, Debug)]
struct PendingMove {
    mv: LocalMove,
    previous_last_move: Option<LastMove>,
}

#[derive(Clone, Debug, Default)]
pub struct AlteredBoard {
    pending: Option<PendingMove>,
    // An authoritative position arrived while the AI was thinking, so the overlay was kept.
    // It goes away as soon as thinking ends.
    overlay_outdated: bool,
}

impl AlteredBoard {
    pub fn new() -> Self { Self::default() }

    pub fn has_pending_move(&self) -> bool { self.pending.is_some() }

    // True when the overlay survived its move and only a fresh position can resolve it.
    pub fn needs_authoritative_refresh(&self, store: &SessionStore) -> bool {
        self.pending.is_none() && store.overlay().is_some() && !**store.ai_thinking()
    }

    pub fn click(&mut self, store: &mut SessionStore, coord: Coord) -> MoveInputResult {
        if let Some(selection) = (*store.selection).clone() {
            match selection.source {
                SelectionSource::Drag => return MoveInputResult::Error(TurnError::DragInProgress),
                SelectionSource::Click => {
                    if selection.destinations.contains(&coord) {
                        return self.attempt_move(store, selection.from, coord).into();
                    }
                    // Includes clicking the selected square again.
                    store.selection.set(None);
                    return MoveInputResult::Noop;
                }
            }
        }
        match self.begin_selection(store, coord, SelectionSource::Click) {
            Ok(()) => MoveInputResult::Noop,
            Err(err) => MoveInputResult::Error(err),
        }
    }

    pub fn start_drag(&mut self, store: &mut SessionStore, coord: Coord) -> Result<(), TurnError> {
        store.selection.set(None);
        self.begin_selection(store, coord, SelectionSource::Drag)
    }

    pub fn abort_drag(&mut self, store: &mut SessionStore) {
        if matches!(*store.selection, Some(Selection { source: SelectionSource::Drag, .. })) {
            store.selection.set(None);
        }
    }

    // Stops the drag. Dropping anywhere except a legal destination cancels it.
    pub fn drag_drop(&mut self, store: &mut SessionStore, dest: Coord) -> MoveInputResult {
        let Some(selection) = (*store.selection).clone() else {
            return MoveInputResult::Error(TurnError::NoMoveInProgress);
        };
        if selection.source != SelectionSource::Drag {
            return MoveInputResult::Error(TurnError::NoMoveInProgress);
        }
        if selection.destinations.contains(&dest) {
            self.attempt_move(store, selection.from, dest).into()
        } else {
            store.selection.set(None);
            MoveInputResult::Noop
        }
    }

    // Applies the move locally and returns it. The move must go to one of the destinations
    // computed when `from` was selected; anything else is rejected without touching the state.
    pub fn attempt_move(
        &mut self, store: &mut SessionStore, from: Coord, to: Coord,
    ) -> Result<LocalMove, TurnError> {
        match &*store.selection {
            Some(selection) if selection.from == from && selection.destinations.contains(&to) => {}
            Some(_) => return Err(TurnError::IllegalDestination),
            None => return Err(TurnError::NoMoveInProgress),
        }
        self.check_can_start_move(store)?;
        let position = store.board().position();
        let mv = position.complete_move(from, to);
        let after = match position.make_move(mv) {
            Ok(after) => after,
            Err(err) => {
                // Destinations come from the same position, so this should never happen.
                warn!("{}", internal_error_message!("{err:?}"));
                store.selection.set(None);
                return Err(TurnError::IllegalDestination);
            }
        };
        self.pending = Some(PendingMove {
            mv,
            previous_last_move: **store.last_move(),
        });
        self.overlay_outdated = false;
        store.selection.set(None);
        store.overlay.set(Some(after));
        store.last_move.set(Some(LastMove { from, to }));
        Ok(mv)
    }

    // Replaces the authoritative board. The overlay is dropped unless the AI is thinking.
    pub fn apply_authoritative(
        &mut self, store: &mut SessionStore, snapshot: GameSnapshot,
    ) -> Result<(), PositionError> {
        let my_force = snapshot.player_color.unwrap_or(**store.player_force());
        let board = BoardState::from_snapshot(snapshot, my_force)?;
        if board.fen() != store.board().fen() {
            // Cached destinations belong to the old position.
            store.selection.set(None);
        }
        store.set_player_force(my_force);
        store.set_board(board);
        if store.overlay().is_some() {
            if **store.ai_thinking() {
                self.overlay_outdated = true;
            } else {
                self.clear_overlay(store);
            }
        }
        Ok(())
    }

    pub fn set_ai_thinking(&mut self, store: &mut SessionStore, thinking: bool) {
        store.ai_thinking.set(thinking);
        if !thinking && self.overlay_outdated {
            self.clear_overlay(store);
        }
    }

    pub fn on_move_result(
        &mut self, store: &mut SessionStore, outcome: MoveOutcome,
    ) -> Result<(), ReconcileError> {
        let pending = self.pending.take();
        // Both confirmations and rejections may carry the server position. A bad one leaves
        // the previous board in place.
        let applied = match outcome.state {
            Some(state) => self.apply_authoritative(store, state),
            None => Ok(()),
        };
        if !outcome.success {
            if let Err(err) = applied {
                warn!("Ignoring position attached to a move rejection: {err}");
            }
            if let Some(pending) = pending {
                store.last_move.set(pending.previous_last_move);
            }
            let reason = outcome.error.unwrap_or_else(|| "Move rejected".to_owned());
            return Err(ReconcileError::MoveRejected(reason));
        }
        applied.map_err(ReconcileError::BadPosition)?;
        let from = outcome.move_from.or(pending.map(|p| p.mv.from));
        let to = outcome.move_to.or(pending.map(|p| p.mv.to));
        if let (Some(from), Some(to)) = (from, to) {
            store.last_move.set(Some(LastMove { from, to }));
        }
        let notation = outcome
            .notation
            .or_else(|| pending.map(|p| uci_notation(p.mv)))
            .unwrap_or_default();
        push_history(store, notation, from, to, true);
        Ok(())
    }

    // The opponent moved. `notation` is the server's, in whatever form it chose.
    pub fn on_opponent_move(
        &mut self, store: &mut SessionStore, notation: Option<String>, from: Option<Coord>,
        to: Option<Coord>, state: Option<GameSnapshot>,
    ) -> Result<(), ReconcileError> {
        if let Some(state) = state {
            self.apply_authoritative(store, state).map_err(ReconcileError::BadPosition)?;
        }
        if let (Some(from), Some(to)) = (from, to) {
            store.last_move.set(Some(LastMove { from, to }));
        }
        let notation = match (notation, from, to) {
            (Some(notation), _, _) => notation,
            (None, Some(from), Some(to)) => format!("{from}{to}"),
            // No move attached: the response was just talk.
            (None, _, _) => return Ok(()),
        };
        push_history(store, notation, from, to, false);
        Ok(())
    }

    // Drops the last two history entries right away. Whether the server actually took back
    // two plies is not verified.
    pub fn request_undo(&mut self, store: &mut SessionStore) {
        store.selection.set(None);
        store.history.update(|history| {
            let keep = history.len().saturating_sub(UNDO_HISTORY_ENTRIES);
            history.truncate(keep);
        });
    }

    pub fn on_undo_result(
        &mut self, store: &mut SessionStore, outcome: UndoOutcome,
    ) -> Result<(), ReconcileError> {
        if let Some(state) = outcome.state {
            self.apply_authoritative(store, state).map_err(ReconcileError::BadPosition)?;
        }
        if !outcome.success {
            return Err(ReconcileError::UndoRejected);
        }
        debug!("Undone: {:?}", outcome.undone_moves);
        store.last_move.set(None);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.overlay_outdated = false;
    }

    fn check_can_start_move(&self, store: &SessionStore) -> Result<(), TurnError> {
        if store.is_game_over() {
            Err(TurnError::GameOver)
        } else if self.pending.is_some() || store.overlay().is_some() {
            Err(TurnError::MovePending)
        } else if !**store.is_my_turn() {
            Err(TurnError::NotMyTurn)
        } else {
            Ok(())
        }
    }

    fn begin_selection(
        &mut self, store: &mut SessionStore, coord: Coord, source: SelectionSource,
    ) -> Result<(), TurnError> {
        self.check_can_start_move(store)?;
        let position = store.board().position();
        let piece = position.piece_on(coord).ok_or(TurnError::PieceMissing)?;
        if piece.force != **store.player_force() {
            return Err(TurnError::NotMyPiece);
        }
        let destinations = position.legal_destinations(coord);
        store.selection.set(Some(Selection { from: coord, destinations, source }));
        Ok(())
    }

    fn clear_overlay(&mut self, store: &mut SessionStore) {
        self.overlay_outdated = false;
        store.overlay.set(None);
    }
}

impl From<Result<LocalMove, TurnError>> for MoveInputResult {
    fn from(result: Result<LocalMove, TurnError>) -> Self {
        match result {
            Ok(mv) => MoveInputResult::Move(mv),
            Err(err) => MoveInputResult::Error(err),
        }
    }
}

fn uci_notation(mv: LocalMove) -> String {
    let mut s = format!("{}{}", mv.from, mv.to);
    if let Some(letter) = mv.promotion.and_then(|p| p.to_promotion_letter()) {
        s.push(letter);
    }
    s
}

fn push_history(
    store: &mut SessionStore, notation: String, from: Option<Coord>, to: Option<Coord>,
    by_player: bool,
) {
    store
        .history
        .update(|history| history.push(MoveHistoryEntry { notation, from, to, by_player }));
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::force::Force;
    use crate::test_util::{position_after, snapshot_after, snapshot_for_player, sq};

    fn white_to_move() -> (AlteredBoard, SessionStore) {
        let mut alt = AlteredBoard::new();
        let mut store = SessionStore::new();
        alt.apply_authoritative(&mut store, snapshot_for_player(&[], Force::White)).unwrap();
        (alt, store)
    }

    #[test]
    fn click_to_move() {
        let (mut alt, mut store) = white_to_move();
        assert_eq!(alt.click(&mut store, sq("e2")), MoveInputResult::Noop);
        assert_eq!(store.selection().as_ref().unwrap().destinations, vec![sq("e3"), sq("e4")]);
        let MoveInputResult::Move(mv) = alt.click(&mut store, sq("e4")) else {
            panic!("expected a move");
        };
        assert_eq!((mv.from, mv.to, mv.promotion), (sq("e2"), sq("e4"), None));
        assert!(store.selection().is_none());
        assert_eq!(store.overlay().as_ref(), Some(&position_after(&["e2e4"])));
        assert_eq!(**store.last_move(), Some(LastMove { from: sq("e2"), to: sq("e4") }));
        assert_eq!(*store.displayed_position(), position_after(&["e2e4"]));
    }

    #[test]
    fn clicks_that_do_nothing() {
        let (mut alt, mut store) = white_to_move();
        assert_eq!(alt.click(&mut store, sq("e4")), MoveInputResult::Error(TurnError::PieceMissing));
        assert_eq!(alt.click(&mut store, sq("e7")), MoveInputResult::Error(TurnError::NotMyPiece));
        assert!(store.selection().is_none());

        alt.click(&mut store, sq("g1"));
        assert_eq!(alt.click(&mut store, sq("g1")), MoveInputResult::Noop);
        assert!(store.selection().is_none());
        assert!(store.overlay().is_none());
    }

    #[test]
    fn cannot_select_out_of_turn() {
        let mut alt = AlteredBoard::new();
        let mut store = SessionStore::new();
        alt.apply_authoritative(&mut store, snapshot_for_player(&[], Force::Black)).unwrap();
        assert_eq!(alt.click(&mut store, sq("e7")), MoveInputResult::Error(TurnError::NotMyTurn));
        assert_eq!(alt.start_drag(&mut store, sq("e7")), Err(TurnError::NotMyTurn));
    }

    #[test]
    fn drag_and_drop() {
        let (mut alt, mut store) = white_to_move();
        alt.start_drag(&mut store, sq("g1")).unwrap();
        assert_eq!(alt.click(&mut store, sq("f3")), MoveInputResult::Error(TurnError::DragInProgress));
        assert_eq!(alt.drag_drop(&mut store, sq("g3")), MoveInputResult::Noop);
        assert!(store.selection().is_none());

        alt.start_drag(&mut store, sq("g1")).unwrap();
        alt.abort_drag(&mut store);
        assert!(store.selection().is_none());
        assert_eq!(
            alt.drag_drop(&mut store, sq("f3")),
            MoveInputResult::Error(TurnError::NoMoveInProgress)
        );

        alt.start_drag(&mut store, sq("g1")).unwrap();
        assert!(matches!(alt.drag_drop(&mut store, sq("f3")), MoveInputResult::Move(_)));
    }

    #[test]
    fn no_second_move_while_pending() {
        let (mut alt, mut store) = white_to_move();
        alt.click(&mut store, sq("e2"));
        alt.click(&mut store, sq("e4"));
        assert_eq!(alt.click(&mut store, sq("d2")), MoveInputResult::Error(TurnError::MovePending));
    }

    #[test]
    fn confirmation_replaces_overlay() {
        let (mut alt, mut store) = white_to_move();
        alt.click(&mut store, sq("e2"));
        alt.click(&mut store, sq("e4"));
        alt.on_move_result(&mut store, MoveOutcome {
            success: true,
            notation: Some("e4".to_owned()),
            state: Some(snapshot_after(&["e2e4"])),
            ..MoveOutcome::default()
        })
        .unwrap();
        assert!(store.overlay().is_none());
        assert_eq!(*store.board().position(), position_after(&["e2e4"]));
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].notation, "e4");
        assert!(store.history()[0].by_player);
        assert!(!alt.needs_authoritative_refresh(&store));
    }

    #[test]
    fn rejection_restores_highlight_and_keeps_board() {
        let (mut alt, mut store) = white_to_move();
        alt.click(&mut store, sq("e2"));
        alt.click(&mut store, sq("e4"));
        let result = alt.on_move_result(&mut store, MoveOutcome {
            success: false,
            error: Some("Not your turn".to_owned()),
            ..MoveOutcome::default()
        });
        assert_eq!(result, Err(ReconcileError::MoveRejected("Not your turn".to_owned())));
        assert_eq!(**store.last_move(), None);
        assert_eq!(*store.board().position(), position_after(&[]));
        assert!(store.overlay().is_some());
        assert!(alt.needs_authoritative_refresh(&store));

        alt.apply_authoritative(&mut store, snapshot_after(&[])).unwrap();
        assert!(store.overlay().is_none());
        assert!(store.history().is_empty());
    }

    #[test]
    fn overlay_survives_while_thinking() {
        let (mut alt, mut store) = white_to_move();
        alt.click(&mut store, sq("e2"));
        alt.click(&mut store, sq("e4"));
        alt.set_ai_thinking(&mut store, true);
        alt.apply_authoritative(&mut store, snapshot_after(&["e2e4"])).unwrap();
        assert!(store.overlay().is_some());
        alt.set_ai_thinking(&mut store, false);
        assert!(store.overlay().is_none());
    }

    #[test]
    fn undo_truncates_history() {
        let (mut alt, mut store) = white_to_move();
        for (notation, by_player) in [("e4", true), ("e5", false), ("Nf3", true)] {
            push_history(&mut store, notation.to_owned(), None, None, by_player);
        }
        alt.request_undo(&mut store);
        assert_eq!(store.history().len(), 1);
        alt.request_undo(&mut store);
        assert!(store.history().is_empty());
        alt.request_undo(&mut store);
        assert!(store.history().is_empty());
    }

    #[test]
    fn undo_result_clears_last_move() {
        let (mut alt, mut store) = white_to_move();
        alt.on_opponent_move(
            &mut store,
            Some("e5".to_owned()),
            Some(sq("e7")),
            Some(sq("e5")),
            None,
        )
        .unwrap();
        assert!(store.last_move().is_some());
        alt.on_undo_result(&mut store, UndoOutcome {
            success: true,
            undone_moves: vec!["e7e5".to_owned(), "e2e4".to_owned()],
            state: Some(snapshot_after(&[])),
        })
        .unwrap();
        assert!(store.last_move().is_none());
    }

    #[test]
    fn auto_queen() {
        let mut alt = AlteredBoard::new();
        let mut store = SessionStore::new();
        let snapshot = GameSnapshot {
            player_color: Some(Force::White),
            ..GameSnapshot::from_position(
                &crate::rules::Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap(),
            )
        };
        alt.apply_authoritative(&mut store, snapshot).unwrap();
        alt.click(&mut store, sq("a7"));
        let MoveInputResult::Move(mv) = alt.click(&mut store, sq("a8")) else {
            panic!("expected a move");
        };
        assert_eq!(mv.promotion, Some(crate::piece::PieceKind::Queen));
    }
}
