// Game channel protocol. Every message is a JSON object with a `type` discriminator.

use serde::{Deserialize, Serialize};

use crate::coord::Coord;
use crate::force::Force;
use crate::game_state::{GameOutcome, GameSnapshot};
use crate::piece::PieceKind;


// Outcome of a move request. The server either puts these fields at the top level of
// `move_result` or nests them under `result`; see `MoveResultPayload::outcome`.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MoveOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "move")]
    pub notation: Option<String>,
    #[serde(default)]
    pub move_from: Option<Coord>,
    #[serde(default)]
    pub move_to: Option<Coord>,
    #[serde(default)]
    pub state: Option<GameSnapshot>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MoveResultPayload {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, rename = "move")]
    pub notation: Option<String>,
    #[serde(default)]
    pub move_from: Option<Coord>,
    #[serde(default)]
    pub move_to: Option<Coord>,
    #[serde(default)]
    pub state: Option<GameSnapshot>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<MoveOutcome>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct UndoOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub undone_moves: Vec<String>,
    #[serde(default)]
    pub state: Option<GameSnapshot>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct UndoResultPayload {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub state: Option<GameSnapshot>,
    #[serde(default)]
    pub result: Option<UndoOutcome>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct AiResponsePayload {
    pub message: String,
    #[serde(default, rename = "move")]
    pub notation: Option<String>,
    #[serde(default)]
    pub move_from: Option<Coord>,
    #[serde(default)]
    pub move_to: Option<Coord>,
    #[serde(default)]
    pub state: Option<GameSnapshot>,
    #[serde(default)]
    pub blunder_feedback: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct GameOverPayload {
    #[serde(default)]
    pub state: Option<GameSnapshot>,
    // From the player's point of view: "win", "loss" or "draw".
    #[serde(default)]
    pub result: Option<GameOutcome>,
    #[serde(default)]
    pub message: Option<String>,
    // "1-0", "0-1" or "1/2-1/2". Used when `result` is missing.
    #[serde(default)]
    pub result_notation: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    GameState { state: GameSnapshot },
    MoveResult(MoveResultPayload),
    AiThinking { thinking: bool },
    AiResponse(AiResponsePayload),
    UndoResult(UndoResultPayload),
    GameOver(GameOverPayload),
    Error { message: String },
    Pong,
    // Anything newer than this client. Ignored.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    NewGame {
        player_color: Force,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    Move {
        from: Coord,
        to: Coord,
        #[serde(with = "promotion_letter")]
        promotion: Option<PieceKind>,
        // The same move in UCI form ("e2e4", "a7a8q"). The game server parses this field.
        #[serde(rename = "move")]
        uci: String,
    },
    Chat {
        message: String,
    },
    Undo,
    Resign,
    GetState,
    Ping,
}

impl MoveResultPayload {
    // Top-level fields take priority over the nested `result` object.
    pub fn outcome(self) -> MoveOutcome {
        let nested = self.result.unwrap_or_default();
        MoveOutcome {
            success: self.success.unwrap_or(nested.success),
            notation: self.notation.or(nested.notation),
            move_from: self.move_from.or(nested.move_from),
            move_to: self.move_to.or(nested.move_to),
            state: self.state.or(nested.state),
            error: self.error.or(nested.error),
        }
    }
}

impl UndoResultPayload {
    pub fn outcome(self) -> UndoOutcome {
        let nested = self.result.unwrap_or_default();
        UndoOutcome {
            success: self.success.unwrap_or(nested.success),
            undone_moves: nested.undone_moves,
            state: self.state.or(nested.state),
        }
    }
}

impl ClientEvent {
    pub fn make_move(from: Coord, to: Coord, promotion: Option<PieceKind>) -> Self {
        let mut uci = format!("{from}{to}");
        if let Some(letter) = promotion.and_then(PieceKind::to_promotion_letter) {
            uci.push(letter);
        }
        ClientEvent::Move { from, to, promotion, uci }
    }
}

mod promotion_letter {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::piece::PieceKind;

    pub fn serialize<S: Serializer>(
        promotion: &Option<PieceKind>, serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match promotion.and_then(PieceKind::to_promotion_letter) {
            Some(letter) => serializer.serialize_char(letter),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<PieceKind>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => PieceKind::from_promotion_letter(ch)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid promotion: {s}"))),
            _ => Err(de::Error::custom(format!("invalid promotion: {s}"))),
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sq(s: &str) -> Coord { Coord::from_algebraic(s).unwrap() }

    #[test]
    fn move_request_wire_format() {
        let event = ClientEvent::make_move(sq("e2"), sq("e4"), None);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "move", "from": "e2", "to": "e4", "promotion": null, "move": "e2e4"})
        );
        let event = ClientEvent::make_move(sq("a7"), sq("a8"), Some(PieceKind::Queen));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "move", "from": "a7", "to": "a8", "promotion": "q", "move": "a7a8q"})
        );
    }

    #[test]
    fn unit_requests() {
        assert_eq!(serde_json::to_value(ClientEvent::Undo).unwrap(), json!({"type": "undo"}));
        assert_eq!(serde_json::to_value(ClientEvent::Resign).unwrap(), json!({"type": "resign"}));
    }

    #[test]
    fn unknown_server_event_is_tolerated() {
        let event: ServerEvent =
            serde_json::from_value(json!({"type": "brand_new_thing", "x": 1})).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn nested_and_flat_move_results_agree() {
        let flat: ServerEvent = serde_json::from_value(json!({
            "type": "move_result", "success": false, "error": "Not your turn"
        }))
        .unwrap();
        let nested: ServerEvent = serde_json::from_value(json!({
            "type": "move_result", "result": {"success": false, "error": "Not your turn"}
        }))
        .unwrap();
        let (ServerEvent::MoveResult(flat), ServerEvent::MoveResult(nested)) = (flat, nested)
        else {
            panic!("expected move results");
        };
        assert_eq!(flat.outcome(), nested.outcome());
    }
}
