use crossterm::style::{Color, Stylize};
use itertools::Itertools;
use voice_chess::altered_board::LastMove;
use voice_chess::chat::{ChatMessage, ChatRole};
use voice_chess::coord::{Col, Coord, Row};
use voice_chess::force::Force;
use voice_chess::piece::{PieceKind, PieceOnBoard};
use voice_chess::rules::Position;


fn piece_to_pictogram(piece: PieceOnBoard) -> char {
    use Force::*;
    use PieceKind::*;
    match (piece.force, piece.kind) {
        (White, Pawn) => '♙',
        (White, Knight) => '♘',
        (White, Bishop) => '♗',
        (White, Rook) => '♖',
        (White, Queen) => '♕',
        (White, King) => '♔',
        (Black, Pawn) => '♟',
        (Black, Knight) => '♞',
        (Black, Bishop) => '♝',
        (Black, Rook) => '♜',
        (Black, Queen) => '♛',
        (Black, King) => '♚',
    }
}

fn format_square(ch: char) -> String { format!(" {ch} ") }

// Board as seen by `perspective`, with the last move highlighted.
pub fn render_board(position: &Position, perspective: Force, last_move: Option<LastMove>) -> String {
    let rows = match perspective {
        Force::White => Row::all().collect_vec().into_iter().rev().collect_vec(),
        Force::Black => Row::all().collect_vec(),
    };
    let cols = match perspective {
        Force::White => Col::all().collect_vec(),
        Force::Black => Col::all().collect_vec().into_iter().rev().collect_vec(),
    };
    let highlighted = |coord: Coord| last_move.is_some_and(|m| m.from == coord || m.to == coord);
    let mut ret = String::new();
    for &row in &rows {
        ret.push_str(&format_square(row.to_algebraic()));
        for &col in &cols {
            let coord = Coord::new(row, col);
            let square = format_square(position.piece_on(coord).map_or(' ', piece_to_pictogram));
            let light = (row.to_zero_based() + col.to_zero_based()) % 2 == 1;
            let background = match (highlighted(coord), light) {
                (true, _) => Color::Rgb { r: 205, g: 210, b: 106 },
                (false, true) => Color::Rgb { r: 240, g: 217, b: 181 },
                (false, false) => Color::Rgb { r: 181, g: 136, b: 99 },
            };
            ret.push_str(&square.with(Color::Black).on(background).to_string());
        }
        ret.push('\n');
    }
    ret.push_str(&format_square(' '));
    for &col in &cols {
        ret.push_str(&format_square(col.to_algebraic()));
    }
    ret.push('\n');
    ret
}

pub fn render_chat_message(message: &ChatMessage) -> String {
    let time = message.time.to_clock_string().with(Color::DarkGrey);
    match message.role {
        ChatRole::User => format!("{time} {} {}", "you:".with(Color::Cyan), message.text),
        ChatRole::Assistant => {
            let notation = match &message.move_notation {
                Some(notation) => format!(" [{notation}]").with(Color::Yellow).to_string(),
                None => String::new(),
            };
            format!("{time} {}{notation} {}", "ai:".with(Color::Green), message.text)
        }
        ChatRole::System => format!("{time} {}", message.text.clone().with(Color::Magenta)),
    }
}
