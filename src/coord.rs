use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::force::Force;


pub const NUM_ROWS: u8 = 8;
pub const NUM_COLS: u8 = 8;


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Row {
    idx: u8, // 0-based
}

impl Row {
    pub const fn from_zero_based(idx: u8) -> Option<Self> {
        if idx < NUM_ROWS { Some(Self { idx }) } else { None }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        let idx = (ch as u32).checked_sub('1' as u32)?;
        Self::from_zero_based(u8::try_from(idx).ok()?)
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub const fn to_algebraic(self) -> char { (self.idx + b'1') as char }
    pub fn all() -> impl Iterator<Item = Self> + Clone { (0..NUM_ROWS).map(|idx| Self { idx }) }

    // The row where pawns of the given force promote.
    pub fn last_for(force: Force) -> Self {
        match force {
            Force::White => Self { idx: NUM_ROWS - 1 },
            Force::Black => Self { idx: 0 },
        }
    }
}


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Col {
    idx: u8, // 0-based
}

impl Col {
    pub const fn from_zero_based(idx: u8) -> Option<Self> {
        if idx < NUM_COLS { Some(Self { idx }) } else { None }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        let idx = (ch.to_ascii_lowercase() as u32).checked_sub('a' as u32)?;
        Self::from_zero_based(u8::try_from(idx).ok()?)
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub const fn to_algebraic(self) -> char { (self.idx + b'a') as char }
    pub fn all() -> impl Iterator<Item = Self> + Clone { (0..NUM_COLS).map(|idx| Self { idx }) }
}


// A board square. Text form is the usual algebraic one: "e4".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    pub row: Row,
    pub col: Col,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CoordParseError(pub String);

impl Coord {
    pub const fn new(row: Row, col: Col) -> Self { Self { row, col } }

    pub fn from_algebraic(s: &str) -> Option<Self> {
        let (col, row) = s.trim().chars().collect_tuple()?;
        Some(Coord {
            row: Row::from_algebraic(row)?,
            col: Col::from_algebraic(col)?,
        })
    }
    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.col.to_algebraic(), self.row.to_algebraic())
    }

    pub fn all() -> impl Iterator<Item = Coord> {
        Row::all().cartesian_product(Col::all()).map(|(row, col)| Coord { row, col })
    }
}

impl FromStr for Coord {
    type Err = CoordParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coord::from_algebraic(s).ok_or_else(|| CoordParseError(s.to_owned()))
    }
}

impl fmt::Display for CoordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid square: \"{}\"", self.0)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col.to_algebraic(), self.row.to_algebraic())
    }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord({}{})", self.col.to_algebraic(), self.row.to_algebraic())
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Coord::from_algebraic(&s).ok_or_else(|| de::Error::custom(CoordParseError(s)))
    }
}

impl From<chess::Square> for Coord {
    fn from(square: chess::Square) -> Self {
        // Both libraries use 0..8 for ranks and files, so the conversion cannot fail.
        Coord {
            row: Row { idx: square.get_rank().to_index() as u8 },
            col: Col { idx: square.get_file().to_index() as u8 },
        }
    }
}

impl From<Coord> for chess::Square {
    fn from(coord: Coord) -> Self {
        chess::Square::make_square(
            chess::Rank::from_index(coord.row.to_zero_based().into()),
            chess::File::from_index(coord.col.to_zero_based().into()),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algebraic_parsing() {
        let e4 = Coord::from_algebraic("e4").unwrap();
        assert_eq!(e4.col.to_zero_based(), 4);
        assert_eq!(e4.row.to_zero_based(), 3);
        assert_eq!(e4.to_string(), "e4");
        assert_eq!(Coord::from_algebraic("E4"), Some(e4));
        assert_eq!(Coord::from_algebraic("i1"), None);
        assert_eq!(Coord::from_algebraic("a9"), None);
        assert_eq!(Coord::from_algebraic("a0"), None);
        assert_eq!(Coord::from_algebraic("e"), None);
        assert_eq!(Coord::from_algebraic("e44"), None);
    }

    #[test]
    fn serde_uses_algebraic_text() {
        let g1: Coord = serde_json::from_str("\"g1\"").unwrap();
        assert_eq!(serde_json::to_string(&g1).unwrap(), "\"g1\"");
        assert!(serde_json::from_str::<Coord>("\"z1\"").is_err());
    }

    #[test]
    fn chess_square_conversion() {
        for coord in Coord::all() {
            let square: chess::Square = coord.into();
            assert_eq!(square.to_string(), coord.to_string());
            assert_eq!(Coord::from(square), coord);
        }
    }
}
