// REST surface of the game server. Requests are plain values (`ApiRequest`) so that any
// HTTP stack can execute them; responses are typed and tolerate missing fields.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::force::Force;
use crate::game_state::GameSnapshot;


pub const API_PREFIX: &str = "/api";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ApiRequest {
    pub method: HttpMethod,
    // Path including the `/api` prefix, e.g. "/api/review/start".
    pub path: String,
    pub body: Option<serde_json::Value>,
}

// Identifies the session a request was issued for. Results that come back after the
// session has changed are discarded.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SessionToken {
    pub session_id: String,
    pub generation: u64,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    pub status: String,
    pub ollama_connected: bool,
    pub model: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceInfo {
    pub key: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceInfo>,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    // Percent.
    pub win_rate: f64,
    pub current_difficulty: i32,
    pub difficulty_name: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NewGameResponse {
    pub game_id: String,
    pub state: GameSnapshot,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteGameResponse {
    pub success: bool,
    pub deleted_backup: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintLevel {
    #[default]
    Full,
    Partial,
    Minimal,
    None,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningSummary {
    pub id: String,
    pub name: String,
    pub color: Option<Force>,
    // The opponent's first move a defense answers, e.g. "e4".
    pub response_to: Option<String>,
    pub description: String,
    pub move_count: u32,
    pub mastery_level: String,
    pub sessions_completed: u32,
    pub average_accuracy: f64,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningsResponse {
    pub openings: Vec<OpeningSummary>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingHint {
    // Present only at the "full" level.
    #[serde(rename = "move")]
    pub notation: Option<String>,
    // Present only at the "partial" level, e.g. "Move your Knight".
    pub piece_hint: Option<String>,
    pub explanation: String,
    pub level: HintLevel,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TrainingStartResponse {
    pub session_id: String,
    pub opening: String,
    pub player_color: Force,
    #[serde(default)]
    pub hint_level: HintLevel,
    pub state: GameSnapshot,
    #[serde(default)]
    pub current_hint: Option<TrainingHint>,
    #[serde(default)]
    pub total_moves: u32,
    #[serde(default)]
    pub current_move_index: u32,
    #[serde(default)]
    pub opponent_first_move: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingMoveResponse {
    pub correct: bool,
    pub message: String,
    pub opponent_move: Option<String>,
    pub expected_move: Option<String>,
    pub state: Option<GameSnapshot>,
    pub next_hint: Option<TrainingHint>,
    pub is_complete: bool,
    // Fraction of the main line played, 0 to 1.
    pub progress: f64,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingCompleteResponse {
    pub session_accuracy: f64,
    pub correct_moves: u32,
    pub incorrect_moves: u32,
    pub new_mastery_level: String,
    pub new_hint_level: HintLevel,
    pub sessions_today: u32,
    pub daily_goal: u32,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewCard {
    pub card_id: String,
    pub card_type: String,
    pub fen: String,
    pub expected_move: String,
    pub alternative_moves: Vec<String>,
    pub explanation: Option<String>,
    pub tactical_theme: Option<String>,
    // Leitner box.
    #[serde(rename = "box")]
    pub leitner_box: u32,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewStats {
    pub total_cards: u32,
    pub due_count: u32,
    pub mastered_count: u32,
    pub by_type: HashMap<String, u32>,
    pub average_box: f64,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewStartResponse {
    // `None` when no cards are due.
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub total_cards: u32,
    pub current_card: Option<ReviewCard>,
    pub progress: f64,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSessionStats {
    pub correct: u32,
    pub incorrect: u32,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewAnswerResponse {
    pub correct: bool,
    pub expected_move: String,
    pub explanation: Option<String>,
    pub new_box: u32,
    pub is_session_complete: bool,
    pub next_card: Option<ReviewCard>,
    pub progress: f64,
    pub session_stats: ReviewSessionStats,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSkipResponse {
    pub skipped: bool,
    pub is_session_complete: bool,
    pub next_card: Option<ReviewCard>,
    pub progress: f64,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewCompleteResponse {
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub total_reviewed: u32,
    pub accuracy: f64,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

fn get(path: &str) -> ApiRequest {
    ApiRequest {
        method: HttpMethod::Get,
        path: format!("{API_PREFIX}/{path}"),
        body: None,
    }
}

fn post(path: &str, body: Option<serde_json::Value>) -> ApiRequest {
    ApiRequest {
        method: HttpMethod::Post,
        path: format!("{API_PREFIX}/{path}"),
        body,
    }
}

// Request builders, one per endpoint. Ids are used as path segments verbatim: the server
// issues them and they never contain '/'.
impl ApiRequest {
    pub fn health() -> Self { get("health") }
    pub fn models() -> Self { get("models") }
    pub fn voices() -> Self { get("voices") }
    pub fn stats() -> Self { get("stats") }

    pub fn new_game(player_color: Force, model: Option<&str>) -> Self {
        post("game/new", Some(json!({ "player_color": player_color, "model": model })))
    }

    pub fn delete_game(game_id: &str) -> Self {
        ApiRequest {
            method: HttpMethod::Delete,
            path: format!("{API_PREFIX}/game/{game_id}/delete"),
            body: None,
        }
    }

    // Response body is MP3 audio, not JSON.
    pub fn tts(text: &str, voice: &str, rate: &str) -> Self {
        post("tts", Some(json!({ "text": text, "voice": voice, "rate": rate })))
    }

    pub fn openings() -> Self { get("openings") }

    pub fn training_start(opening_id: &str) -> Self {
        post("training/start", Some(json!({ "opening_id": opening_id })))
    }
    pub fn training_move(session_id: &str, notation: &str) -> Self {
        post(&format!("training/{session_id}/move"), Some(json!({ "move": notation })))
    }
    pub fn training_complete(session_id: &str) -> Self {
        post(&format!("training/{session_id}/complete"), None)
    }

    pub fn review_stats() -> Self { get("review/stats") }
    pub fn review_start(card_limit: u32, card_type: Option<&str>) -> Self {
        post("review/start", Some(json!({ "card_limit": card_limit, "card_type": card_type })))
    }
    pub fn review_answer(session_id: &str, notation: &str) -> Self {
        post(&format!("review/{session_id}/answer"), Some(json!({ "move": notation })))
    }
    pub fn review_skip(session_id: &str) -> Self {
        post(&format!("review/{session_id}/skip"), None)
    }
    pub fn review_complete(session_id: &str) -> Self {
        post(&format!("review/{session_id}/complete"), None)
    }
}
