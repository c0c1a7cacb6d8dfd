// Client side of an opening drill. The server walks the opening's main line and answers each
// correct move with the book reply; the client keeps the board, the hint and the score.

use crate::api::{
    HintLevel, TrainingCompleteResponse, TrainingHint, TrainingMoveResponse,
    TrainingStartResponse,
};
use crate::force::Force;
use crate::game_state::BoardState;
use crate::rules::PositionError;


#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TrainingMoveOutcome {
    Correct {
        message: String,
        opponent_move: Option<String>,
    },
    Incorrect {
        message: String,
        expected_move: Option<String>,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub struct TrainingSession {
    session_id: String,
    opening: String,
    player_force: Force,
    hint_level: HintLevel,
    board: BoardState,
    current_hint: Option<TrainingHint>,
    total_moves: u32,
    progress: f64,
    correct_moves: u32,
    incorrect_moves: u32,
    is_complete: bool,
}

impl TrainingSession {
    pub fn start(response: TrainingStartResponse) -> Result<Self, PositionError> {
        let board = BoardState::from_snapshot(response.state, response.player_color)?;
        Ok(TrainingSession {
            session_id: response.session_id,
            opening: response.opening,
            player_force: response.player_color,
            hint_level: response.hint_level,
            board,
            current_hint: response.current_hint,
            total_moves: response.total_moves,
            progress: 0.0,
            correct_moves: 0,
            incorrect_moves: 0,
            is_complete: false,
        })
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn opening(&self) -> &str { &self.opening }
    pub fn player_force(&self) -> Force { self.player_force }
    pub fn hint_level(&self) -> HintLevel { self.hint_level }
    pub fn board(&self) -> &BoardState { &self.board }
    pub fn current_hint(&self) -> Option<&TrainingHint> { self.current_hint.as_ref() }
    pub fn total_moves(&self) -> u32 { self.total_moves }
    pub fn progress(&self) -> f64 { self.progress }
    pub fn correct_moves(&self) -> u32 { self.correct_moves }
    pub fn incorrect_moves(&self) -> u32 { self.incorrect_moves }
    pub fn is_complete(&self) -> bool { self.is_complete }

    pub fn accuracy(&self) -> f64 {
        let total = self.correct_moves + self.incorrect_moves;
        if total == 0 { 1.0 } else { f64::from(self.correct_moves) / f64::from(total) }
    }

    // Text of the hint as it should be shown or spoken, depending on the hint level.
    pub fn hint_text(&self) -> Option<String> {
        let hint = self.current_hint.as_ref()?;
        match (&hint.notation, &hint.piece_hint) {
            (Some(notation), _) => Some(format!("Play {notation}. {}", hint.explanation)),
            (None, Some(piece_hint)) => Some(format!("{piece_hint}.")),
            (None, None) if hint.level == HintLevel::Minimal => Some(hint.explanation.clone()),
            (None, None) => None,
        }
    }

    pub fn apply_move(
        &mut self, response: TrainingMoveResponse,
    ) -> Result<TrainingMoveOutcome, PositionError> {
        if let Some(state) = response.state {
            self.board = BoardState::from_snapshot(state, self.player_force)?;
        }
        self.progress = response.progress;
        self.is_complete = response.is_complete;
        if response.correct {
            self.correct_moves += 1;
            self.current_hint = response.next_hint;
            Ok(TrainingMoveOutcome::Correct {
                message: response.message,
                opponent_move: response.opponent_move,
            })
        } else {
            self.incorrect_moves += 1;
            Ok(TrainingMoveOutcome::Incorrect {
                message: response.message,
                expected_move: response.expected_move,
            })
        }
    }

    pub fn apply_complete(&mut self, response: &TrainingCompleteResponse) {
        self.is_complete = true;
        self.correct_moves = response.correct_moves;
        self.incorrect_moves = response.incorrect_moves;
        self.hint_level = response.new_hint_level;
    }
}
