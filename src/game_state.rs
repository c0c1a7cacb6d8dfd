use serde::{Deserialize, Serialize};

use crate::force::Force;
use crate::rules::{Position, PositionError, PositionStatus};


// Game state as the server reports it. Only `fen` is required: older server builds omit
// the rest, and anything missing is derived from the position itself.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub fen: String,
    #[serde(default)]
    pub player_color: Option<Force>,
    #[serde(default)]
    pub turn: Option<Force>,
    #[serde(default)]
    pub moves: Vec<String>,
    #[serde(default)]
    pub is_check: bool,
    #[serde(default)]
    pub is_checkmate: bool,
    #[serde(default)]
    pub is_stalemate: bool,
    #[serde(default)]
    pub is_game_over: bool,
    #[serde(default)]
    pub legal_moves: Vec<String>,
    // "1-0", "0-1", "1/2-1/2" or null while the game is on.
    #[serde(default)]
    pub result: Option<String>,
}

// Game result from the local player's point of view.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
    Draw,
    Undetermined,
}

// Authoritative board. Always built from a complete server snapshot and replaced as a
// whole, so it cannot drift away from the server's notation.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BoardState {
    position: Position,
    fen: String,
    active_force: Force,
    moves: Vec<String>,
    is_check: bool,
    is_checkmate: bool,
    is_stalemate: bool,
    is_game_over: bool,
    outcome: GameOutcome,
}

impl GameOutcome {
    pub fn from_result_notation(notation: &str, my_force: Force) -> Self {
        let winner = match notation.trim() {
            "1-0" => Force::White,
            "0-1" => Force::Black,
            "1/2-1/2" | "½-½" => return GameOutcome::Draw,
            _ => return GameOutcome::Undetermined,
        };
        if winner == my_force { GameOutcome::Win } else { GameOutcome::Loss }
    }

    pub fn is_determined(self) -> bool { self != GameOutcome::Undetermined }

    pub fn to_readable_string(self) -> &'static str {
        match self {
            GameOutcome::Win => "You won",
            GameOutcome::Loss => "You lost",
            GameOutcome::Draw => "Draw",
            GameOutcome::Undetermined => "Game over",
        }
    }
}

impl GameSnapshot {
    pub fn from_position(position: &Position) -> Self {
        let status = position.status();
        let is_checkmate = status == PositionStatus::Checkmate;
        let is_stalemate = status == PositionStatus::Stalemate;
        GameSnapshot {
            fen: position.to_fen(),
            player_color: None,
            turn: Some(position.active_force()),
            moves: Vec::new(),
            is_check: status == PositionStatus::Check || is_checkmate,
            is_checkmate,
            is_stalemate,
            is_game_over: is_checkmate || is_stalemate,
            legal_moves: Vec::new(),
            result: None,
        }
    }
}

impl BoardState {
    pub fn start() -> Self {
        let position = Position::start();
        BoardState {
            fen: position.to_fen(),
            active_force: position.active_force(),
            position,
            moves: Vec::new(),
            is_check: false,
            is_checkmate: false,
            is_stalemate: false,
            is_game_over: false,
            outcome: GameOutcome::Undetermined,
        }
    }

    pub fn from_snapshot(snapshot: GameSnapshot, my_force: Force) -> Result<Self, PositionError> {
        let position = Position::from_fen(&snapshot.fen)?;
        let outcome = snapshot
            .result
            .as_deref()
            .map_or(GameOutcome::Undetermined, |r| GameOutcome::from_result_notation(r, my_force));
        Ok(BoardState {
            active_force: snapshot.turn.unwrap_or_else(|| position.active_force()),
            position,
            fen: snapshot.fen,
            moves: snapshot.moves,
            is_check: snapshot.is_check,
            is_checkmate: snapshot.is_checkmate,
            is_stalemate: snapshot.is_stalemate,
            is_game_over: snapshot.is_game_over || snapshot.is_checkmate || snapshot.is_stalemate,
            outcome,
        })
    }

    pub fn position(&self) -> &Position { &self.position }
    pub fn fen(&self) -> &str { &self.fen }
    pub fn active_force(&self) -> Force { self.active_force }
    pub fn moves(&self) -> &[String] { &self.moves }
    pub fn is_check(&self) -> bool { self.is_check }
    pub fn is_checkmate(&self) -> bool { self.is_checkmate }
    pub fn is_stalemate(&self) -> bool { self.is_stalemate }
    pub fn is_game_over(&self) -> bool { self.is_game_over }
    pub fn outcome(&self) -> GameOutcome { self.outcome }
}

impl Default for BoardState {
    fn default() -> Self { Self::start() }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::START_FEN;

    #[test]
    fn minimal_snapshot_is_accepted() {
        let snapshot: GameSnapshot =
            serde_json::from_str(&format!(r#"{{"fen": "{START_FEN}"}}"#)).unwrap();
        let board = BoardState::from_snapshot(snapshot, Force::White).unwrap();
        assert_eq!(board.active_force(), Force::White);
        assert!(!board.is_game_over());
        assert_eq!(board.outcome(), GameOutcome::Undetermined);
    }

    #[test]
    fn outcome_is_relative_to_player() {
        assert_eq!(GameOutcome::from_result_notation("1-0", Force::White), GameOutcome::Win);
        assert_eq!(GameOutcome::from_result_notation("1-0", Force::Black), GameOutcome::Loss);
        assert_eq!(GameOutcome::from_result_notation("1/2-1/2", Force::Black), GameOutcome::Draw);
        assert_eq!(GameOutcome::from_result_notation("*", Force::Black), GameOutcome::Undetermined);
    }

    #[test]
    fn unparsable_fen_is_rejected() {
        let snapshot = GameSnapshot {
            fen: "garbage".to_owned(),
            ..GameSnapshot::from_position(&Position::start())
        };
        assert!(BoardState::from_snapshot(snapshot, Force::White).is_err());
    }
}
