use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};


// Side in a chess game. Serialized the way the game server spells colors: "white" / "black".
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, EnumIter, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Force {
    White,
    Black,
}

impl Force {
    pub fn opponent(self) -> Force {
        match self {
            Force::White => Force::Black,
            Force::Black => Force::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Force::White => "white",
            Force::Black => "black",
        }
    }
}

impl fmt::Display for Force {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl From<chess::Color> for Force {
    fn from(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Force::White,
            chess::Color::Black => Force::Black,
        }
    }
}

impl From<Force> for chess::Color {
    fn from(force: Force) -> Self {
        match force {
            Force::White => chess::Color::White,
            Force::Black => chess::Color::Black,
        }
    }
}
