// Core of a voice-driven chess client. No IO happens here: drivers feed in channel messages,
// speech recognition results and the current time, and execute the commands that come out.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod altered_board;
pub mod api;
pub mod chat;
pub mod client;
pub mod connection;
pub mod coord;
pub mod error;
pub mod event;
pub mod force;
pub mod game_state;
pub mod observable;
pub mod piece;
pub mod review;
pub mod rules;
pub mod session_store;
pub mod speech_text;
pub mod test_util;
pub mod training;
pub mod utc_time;
pub mod util;
pub mod voice;
