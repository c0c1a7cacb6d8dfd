// Local rules engine. Used only for display responsiveness: legal-destination preview for
// the selected piece and the position to show before the server confirms a move. The
// server remains the judge of legality; nothing here is treated as authoritative.
//
// Backed by the `chess` crate. `Position` is the only type that touches it directly.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::coord::{Coord, Row};
use crate::force::Force;
use crate::piece::{PieceKind, PieceOnBoard};


pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// Promotion is always resolved to the strongest piece. There is no promotion-choice UI.
pub const AUTO_PROMOTION: PieceKind = PieceKind::Queen;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PositionError {
    pub fen: String,
    pub reason: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PositionStatus {
    Ongoing,
    Check,
    Checkmate,
    Stalemate,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LocalMove {
    pub from: Coord,
    pub to: Coord,
    pub promotion: Option<PieceKind>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IllegalLocalMove {
    pub from: Coord,
    pub to: Coord,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Position {
    board: chess::Board,
}

impl Position {
    pub fn start() -> Self { Position { board: chess::Board::default() } }

    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        chess::Board::from_str(fen.trim())
            .map(|board| Position { board })
            .map_err(|err| PositionError {
                fen: fen.to_owned(),
                reason: format!("{err:?}"),
            })
    }

    pub fn to_fen(&self) -> String { self.board.to_string() }

    pub fn active_force(&self) -> Force { self.board.side_to_move().into() }

    pub fn status(&self) -> PositionStatus {
        match self.board.status() {
            chess::BoardStatus::Checkmate => PositionStatus::Checkmate,
            chess::BoardStatus::Stalemate => PositionStatus::Stalemate,
            chess::BoardStatus::Ongoing if self.board.checkers().popcnt() > 0 => {
                PositionStatus::Check
            }
            chess::BoardStatus::Ongoing => PositionStatus::Ongoing,
        }
    }

    pub fn piece_on(&self, coord: Coord) -> Option<PieceOnBoard> {
        let square = coord.into();
        let kind = self.board.piece_on(square)?;
        let color = self.board.color_on(square)?;
        Some(PieceOnBoard { kind: kind.into(), force: color.into() })
    }

    // Destinations of all legal moves starting at `from`. Promotions to different pieces
    // share a destination and are reported once.
    pub fn legal_destinations(&self, from: Coord) -> Vec<Coord> {
        let from_square: chess::Square = from.into();
        chess::MoveGen::new_legal(&self.board)
            .filter(|mv| mv.get_source() == from_square)
            .map(|mv| Coord::from(mv.get_dest()))
            .unique()
            .sorted()
            .collect()
    }

    pub fn is_promotion(&self, from: Coord, to: Coord) -> bool {
        match self.piece_on(from) {
            Some(PieceOnBoard { kind: PieceKind::Pawn, force }) => to.row == Row::last_for(force),
            _ => false,
        }
    }

    // Resolves promotion automatically, so the caller only supplies the two squares.
    pub fn complete_move(&self, from: Coord, to: Coord) -> LocalMove {
        let promotion = self.is_promotion(from, to).then_some(AUTO_PROMOTION);
        LocalMove { from, to, promotion }
    }

    pub fn make_move(&self, mv: LocalMove) -> Result<Position, IllegalLocalMove> {
        let chess_move =
            chess::ChessMove::new(mv.from.into(), mv.to.into(), mv.promotion.map(Into::into));
        if self.board.legal(chess_move) {
            Ok(Position { board: self.board.make_move_new(chess_move) })
        } else {
            Err(IllegalLocalMove { from: mv.from, to: mv.to })
        }
    }
}

impl Default for Position {
    fn default() -> Self { Self::start() }
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse position \"{}\": {}", self.fen, self.reason)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Coord { Coord::from_algebraic(s).unwrap() }

    #[test]
    fn start_position() {
        let pos = Position::from_fen(START_FEN).unwrap();
        assert_eq!(pos, Position::start());
        assert_eq!(Position::from_fen(&pos.to_fen()).unwrap(), pos);
        assert_eq!(pos.active_force(), Force::White);
        assert_eq!(pos.legal_destinations(sq("e2")), vec![sq("e3"), sq("e4")]);
        assert_eq!(pos.legal_destinations(sq("g1")), vec![sq("f3"), sq("h3")]);
        assert!(pos.legal_destinations(sq("e7")).is_empty());
        assert!(pos.legal_destinations(sq("e4")).is_empty());
    }

    #[test]
    fn bad_fen_is_reported() {
        let err = Position::from_fen("not a position").unwrap_err();
        assert_eq!(err.fen, "not a position");
    }

    #[test]
    fn move_application() {
        let pos = Position::start();
        let after = pos.make_move(pos.complete_move(sq("e2"), sq("e4"))).unwrap();
        assert_eq!(after.active_force(), Force::Black);
        assert_eq!(
            after.piece_on(sq("e4")),
            Some(PieceOnBoard { kind: PieceKind::Pawn, force: Force::White })
        );
        assert_eq!(after.piece_on(sq("e2")), None);
        assert!(pos.make_move(pos.complete_move(sq("e2"), sq("e5"))).is_err());
    }

    #[test]
    fn pawn_auto_promotes_to_queen() {
        let pos = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        assert!(pos.is_promotion(sq("a7"), sq("a8")));
        let mv = pos.complete_move(sq("a7"), sq("a8"));
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
        assert_eq!(pos.legal_destinations(sq("a7")), vec![sq("a8")]);
        let after = pos.make_move(mv).unwrap();
        assert_eq!(
            after.piece_on(sq("a8")),
            Some(PieceOnBoard { kind: PieceKind::Queen, force: Force::White })
        );
    }

    #[test]
    fn status_detection() {
        let mate = Position::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        assert_eq!(mate.status(), PositionStatus::Checkmate);
        assert_eq!(Position::start().status(), PositionStatus::Ongoing);
    }
}
