// Test utilities shared by unit tests and the "tests" folder.

use crate::coord::Coord;
use crate::force::Force;
use crate::game_state::GameSnapshot;
use crate::once_cell_regex;
use crate::piece::PieceKind;
use crate::rules::{LocalMove, Position};


pub fn parse_uci(uci: &str) -> LocalMove {
    let uci_re = once_cell_regex!(r"^([a-h][1-8])([a-h][1-8])([qrbn])?$");
    let caps = uci_re.captures(uci).unwrap_or_else(|| panic!("Bad UCI move: {uci}"));
    LocalMove {
        from: Coord::from_algebraic(caps.get(1).unwrap().as_str()).unwrap(),
        to: Coord::from_algebraic(caps.get(2).unwrap().as_str()).unwrap(),
        promotion: caps
            .get(3)
            .map(|m| PieceKind::from_promotion_letter(m.as_str().chars().next().unwrap()).unwrap()),
    }
}

// Plays UCI moves ("e2e4 e7e5") from the starting position.
pub fn position_after(moves: &[&str]) -> Position {
    let mut position = Position::start();
    for uci in moves {
        position = position
            .make_move(parse_uci(uci))
            .unwrap_or_else(|err| panic!("Illegal move {uci}: {err:?}"));
    }
    position
}

// A snapshot as the server would send it. Moves are recorded in UCI rather than SAN, which
// is fine since the client never interprets the move list.
pub fn snapshot_after(moves: &[&str]) -> GameSnapshot {
    GameSnapshot {
        moves: moves.iter().map(|m| m.to_string()).collect(),
        ..GameSnapshot::from_position(&position_after(moves))
    }
}

pub fn snapshot_for_player(moves: &[&str], player: Force) -> GameSnapshot {
    GameSnapshot {
        player_color: Some(player),
        ..snapshot_after(moves)
    }
}

pub fn sq(s: &str) -> Coord {
    Coord::from_algebraic(s).unwrap_or_else(|| panic!("Bad square: {s}"))
}
