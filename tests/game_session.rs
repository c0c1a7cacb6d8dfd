mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use voice_chess::altered_board::{LastMove, MoveHistoryEntry, MoveInputResult, TurnError};
use voice_chess::chat::ChatRole;
use voice_chess::client::{EventError, NotableEvent};
use voice_chess::connection::{ConnectionState, RECONNECT_DELAY};
use voice_chess::event::ClientEvent;
use voice_chess::force::Force::{self, Black, White};
use voice_chess::game_state::GameOutcome;
use voice_chess::rules::Position;
use voice_chess::test_util::{position_after, snapshot_after, sq};


const RECONNECT_MILLIS: u64 = RECONNECT_DELAY.as_millis() as u64;

// Makes a local move and lets the server confirm it.
fn play_confirmed(client: &mut TestClient, from: &str, to: &str, moves_after: &[&str]) {
    assert_eq!(client.state.click_square(sq(from)), MoveInputResult::Noop);
    assert!(matches!(client.state.click_square(sq(to)), MoveInputResult::Move(_)));
    let event = client
        .server(json!({
            "type": "move_result",
            "success": true,
            "state": snapshot_after(moves_after),
            "move_from": from,
            "move_to": to,
        }))
        .unwrap();
    assert_eq!(event, NotableEvent::MoveConfirmed);
}

fn opponent_moves(client: &mut TestClient, notation: &str, from: &str, to: &str, moves_after: &[&str]) {
    client
        .server(json!({
            "type": "ai_response",
            "message": format!("I play {notation}."),
            "move": notation,
            "move_from": from,
            "move_to": to,
            "state": snapshot_after(moves_after),
        }))
        .unwrap();
}

fn history_notation(client: &TestClient) -> Vec<String> {
    client.state.store().history().iter().map(|e| e.notation.clone()).collect()
}

#[test]
fn move_confirmed() {
    let mut client = TestClient::in_game(White, voice_off());
    assert_eq!(client.state.click_square(sq("e2")), MoveInputResult::Noop);
    assert!(matches!(client.state.click_square(sq("e4")), MoveInputResult::Move(_)));
    assert_eq!(client.take_sent(), vec![ClientEvent::make_move(sq("e2"), sq("e4"), None)]);

    // Provisional: the overlay shows the move, the authoritative board does not.
    let store = client.state.store();
    assert_eq!(**store.overlay(), Some(position_after(&["e2e4"])));
    assert_eq!(*store.displayed_position(), position_after(&["e2e4"]));
    assert_eq!(*store.board().position(), Position::start());

    let event = client
        .server(json!({
            "type": "move_result",
            "success": true,
            "state": snapshot_after(&["e2e4"]),
            "move_from": "e2",
            "move_to": "e4",
        }))
        .unwrap();
    assert_eq!(event, NotableEvent::MoveConfirmed);
    let store = client.state.store();
    assert_eq!(*store.board().position(), position_after(&["e2e4"]));
    assert_eq!(**store.overlay(), None);
    assert_eq!(**store.last_move(), Some(LastMove { from: sq("e2"), to: sq("e4") }));
    assert_eq!(**store.history(), vec![MoveHistoryEntry {
        notation: "e2e4".to_owned(),
        from: Some(sq("e2")),
        to: Some(sq("e4")),
        by_player: true,
    }]);
    assert!(!**store.is_my_turn());
}

#[test]
fn move_confirmed_in_nested_form() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.click_square(sq("g1"));
    client.state.click_square(sq("f3"));
    client
        .server(json!({
            "type": "move_result",
            "result": {"success": true, "move": "Nf3", "state": snapshot_after(&["g1f3"])},
        }))
        .unwrap();
    assert_eq!(history_notation(&client), vec!["Nf3"]);
    assert_eq!(
        **client.state.store().last_move(),
        Some(LastMove { from: sq("g1"), to: sq("f3") })
    );
}

#[test]
fn move_rejected() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.click_square(sq("e2"));
    client.state.click_square(sq("e4"));
    client.take_sent();

    let event = client
        .server(json!({"type": "move_result", "success": false, "error": "Not your turn"}))
        .unwrap();
    assert_eq!(event, NotableEvent::MoveRejected("Not your turn".to_owned()));
    assert_eq!(client.chat_lines().last().unwrap(), &(ChatRole::System, "Not your turn".to_owned()));
    assert_eq!(*client.state.store().board().position(), Position::start());
    assert_eq!(**client.state.store().last_move(), None);
    assert!(client.state.store().history().is_empty());

    // The overlay is resolved by the next authoritative position, which the client asks for.
    assert!(client.state.store().overlay().is_some());
    assert_eq!(client.take_sent(), vec![ClientEvent::GetState]);
    client.server_state(snapshot_after(&[])).unwrap();
    assert_eq!(**client.state.store().overlay(), None);
}

#[test]
fn move_rejected_with_bad_position() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.click_square(sq("e2"));
    client.state.click_square(sq("e4"));
    assert!(client.state.store().last_move().is_some());
    client.take_sent();

    let event = client
        .server(json!({
            "type": "move_result",
            "success": false,
            "error": "Not your turn",
            "state": {"fen": "garbage"},
        }))
        .unwrap();
    assert_eq!(event, NotableEvent::MoveRejected("Not your turn".to_owned()));
    assert_eq!(client.chat_lines().last().unwrap(), &(ChatRole::System, "Not your turn".to_owned()));
    assert_eq!(*client.state.store().board().position(), Position::start());
    assert_eq!(**client.state.store().last_move(), None);
    assert_eq!(client.take_sent(), vec![ClientEvent::GetState]);
}

#[test]
fn overlay_survives_thinking() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.click_square(sq("d2"));
    client.state.click_square(sq("d4"));
    client.server(json!({"type": "ai_thinking", "thinking": true})).unwrap();
    client
        .server(json!({"type": "move_result", "success": true, "state": snapshot_after(&["d2d4"])}))
        .unwrap();
    assert_eq!(**client.state.store().overlay(), Some(position_after(&["d2d4"])));
    assert!(**client.state.store().ai_thinking());

    client.server(json!({"type": "ai_thinking", "thinking": false})).unwrap();
    assert_eq!(**client.state.store().overlay(), None);
    assert!(!**client.state.store().ai_thinking());
}

#[test]
fn no_second_move_while_pending() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.click_square(sq("e2"));
    client.state.click_square(sq("e4"));
    assert_eq!(
        client.state.click_square(sq("d2")),
        MoveInputResult::Error(TurnError::MovePending)
    );
    assert_eq!(client.take_sent().len(), 1);
}

#[test]
fn selection_toggles_off() {
    let mut client = TestClient::in_game(White, voice_off());
    assert_eq!(client.state.click_square(sq("e2")), MoveInputResult::Noop);
    assert!(client.state.store().selection().is_some());
    assert_eq!(client.state.click_square(sq("e2")), MoveInputResult::Noop);
    assert!(client.state.store().selection().is_none());
    assert!(client.state.store().overlay().is_none());
    assert!(client.take_sent().is_empty());
}

#[test]
fn bogus_input_never_reaches_server() {
    let mut client = TestClient::in_game(White, voice_off());
    assert_eq!(
        client.state.click_square(sq("e7")),
        MoveInputResult::Error(TurnError::NotMyPiece)
    );
    assert_eq!(
        client.state.click_square(sq("e4")),
        MoveInputResult::Error(TurnError::PieceMissing)
    );
    assert_eq!(
        client.state.make_move(sq("e2"), sq("e5")),
        MoveInputResult::Error(TurnError::IllegalDestination)
    );
    assert!(client.state.store().selection().is_none());

    client.state.start_drag(sq("b1")).unwrap();
    assert_eq!(client.state.drag_drop(sq("b3")), MoveInputResult::Noop);
    assert!(client.take_sent().is_empty());
    assert_eq!(*client.state.store().displayed_position(), Position::start());
}

#[test]
fn drag_and_drop() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.start_drag(sq("b1")).unwrap();
    assert_eq!(
        client.state.click_square(sq("c3")),
        MoveInputResult::Error(TurnError::DragInProgress)
    );
    assert!(matches!(client.state.drag_drop(sq("c3")), MoveInputResult::Move(_)));
    assert_eq!(client.take_sent(), vec![ClientEvent::make_move(sq("b1"), sq("c3"), None)]);
}

#[test]
fn cannot_move_out_of_turn() {
    let mut client = TestClient::in_game(Black, voice_off());
    assert_eq!(
        client.state.click_square(sq("e7")),
        MoveInputResult::Error(TurnError::NotMyTurn)
    );
    opponent_moves(&mut client, "e4", "e2", "e4", &["e2e4"]);
    assert!(**client.state.store().is_my_turn());
    assert!(matches!(client.state.make_move(sq("e7"), sq("e5")), MoveInputResult::Move(_)));
}

#[test]
fn undo_truncates_history() {
    let mut client = TestClient::in_game(White, voice_off());
    play_confirmed(&mut client, "e2", "e4", &["e2e4"]);
    opponent_moves(&mut client, "e5", "e7", "e5", &["e2e4", "e7e5"]);
    play_confirmed(&mut client, "g1", "f3", &["e2e4", "e7e5", "g1f3"]);
    assert_eq!(history_notation(&client), vec!["e2e4", "e5", "g1f3"]);
    client.take_sent();

    client.state.request_undo();
    assert_eq!(history_notation(&client), vec!["e2e4"]);
    assert_eq!(client.take_sent(), vec![ClientEvent::Undo]);
    let event = client
        .server(json!({
            "type": "undo_result",
            "result": {
                "success": true,
                "undone_moves": ["Nf3", "e5"],
                "state": snapshot_after(&["e2e4"]),
            },
        }))
        .unwrap();
    assert_eq!(event, NotableEvent::UndoApplied);
    assert_eq!(**client.state.store().last_move(), None);
    assert_eq!(*client.state.store().board().position(), position_after(&["e2e4"]));

    // Fewer than two entries: history is cleared.
    client.state.request_undo();
    assert!(client.state.store().history().is_empty());
}

#[test]
fn undo_rejected() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.request_undo();
    let event = client.server(json!({"type": "undo_result", "success": false})).unwrap();
    assert_eq!(event, NotableEvent::None);
    assert_eq!(client.chat_lines().last().unwrap().0, ChatRole::System);
}

#[test]
fn game_over_and_new_game() {
    let mut client = TestClient::in_game(White, voice_off());
    let event = client
        .server(json!({"type": "game_over", "result": "win", "message": "Checkmate!"}))
        .unwrap();
    let NotableEvent::GameOver(notice) = event else {
        panic!("Expected game over, got {event:?}");
    };
    assert_eq!(notice.outcome, GameOutcome::Win);
    assert!(client.state.store().is_game_over());
    // The board is only ever replaced by server snapshots; the notice carries the ending.
    assert!(!client.state.store().board().is_game_over());
    assert_eq!(client.state.store().board().outcome(), GameOutcome::Undetermined);
    assert_eq!(
        client.chat_lines().last().unwrap(),
        &(ChatRole::System, "Game over. Checkmate!".to_owned())
    );
    assert_eq!(
        client.state.click_square(sq("e2")),
        MoveInputResult::Error(TurnError::GameOver)
    );

    client.take_sent();
    client.state.new_game(Black, Some("llama3".to_owned()));
    assert_eq!(client.take_sent(), vec![ClientEvent::NewGame {
        player_color: Black,
        model: Some("llama3".to_owned()),
    }]);
    assert!(!client.state.store().is_game_over());
    assert_eq!(**client.state.store().player_force(), Black);
}

#[test]
fn game_over_from_result_notation() {
    let mut client = TestClient::in_game(White, voice_off());
    let event = client.server(json!({"type": "game_over", "result_notation": "0-1"})).unwrap();
    let NotableEvent::GameOver(notice) = event else {
        panic!("Expected game over, got {event:?}");
    };
    assert_eq!(notice.outcome, GameOutcome::Loss);
    assert_eq!(notice.message, GameOutcome::Loss.to_readable_string());
}

#[test]
fn resign_is_sent() {
    let mut client = TestClient::in_game(White, voice_off());
    client.state.resign();
    assert_eq!(client.take_sent(), vec![ClientEvent::Resign]);
}

#[test]
fn server_error_goes_to_chat() {
    let mut client = TestClient::in_game(White, voice_off());
    let ret = client.server(json!({"type": "error", "message": "Game not found"}));
    assert!(matches!(ret, Err(EventError::ServerReturnedError(_))));
    assert_eq!(
        client.chat_lines().last().unwrap(),
        &(ChatRole::System, "Game not found".to_owned())
    );
}

#[test]
fn bad_frames_keep_previous_state() {
    let mut client = TestClient::in_game(White, voice_off());
    play_confirmed(&mut client, "e2", "e4", &["e2e4"]);
    assert!(matches!(client.server_raw("{not json"), Err(EventError::CannotApplyEvent(_))));
    let ret = client.server(json!({"type": "game_state", "state": {"fen": "garbage"}}));
    assert!(matches!(ret, Err(EventError::CannotApplyEvent(_))));
    assert_eq!(client.server(json!({"type": "shiny_new_thing"})), Ok(NotableEvent::None));
    assert_eq!(client.server(json!({"type": "pong"})), Ok(NotableEvent::None));
    assert_eq!(*client.state.store().board().position(), position_after(&["e2e4"]));
}

#[test]
fn reconnects_after_drop() {
    let mut client = TestClient::in_game(White, voice_off());
    client.drop_connection(client.at(0));
    assert_eq!(**client.state.store().connection(), ConnectionState::Disconnected);

    // Nothing is sent while disconnected.
    client.state.send_chat("anyone there?");
    assert!(client.take_sent().is_empty());

    client.refresh(client.at(RECONNECT_MILLIS - 1));
    assert!(!client.has_pending_connection());
    client.refresh(client.at(RECONNECT_MILLIS));
    assert!(client.has_pending_connection());
    assert_eq!(**client.state.store().connection(), ConnectionState::Connecting);

    assert!(client.accept_connection());
    assert_eq!(**client.state.store().connection(), ConnectionState::Connected);
    assert_eq!(client.take_sent(), vec![ClientEvent::GetState]);
}

#[test]
fn reconnect_retries_indefinitely() {
    let mut client = TestClient::in_game(White, voice_off());
    let mut t = 0;
    client.drop_connection(client.at(t));
    for _ in 0..10 {
        t += RECONNECT_MILLIS;
        client.refresh(client.at(t));
        assert!(client.has_pending_connection());
        // The attempt fails.
        let channel = client.state.connection().current_channel().unwrap();
        client.state.on_channel_close(channel, client.at(t));
        client.pump();
        assert_eq!(**client.state.store().connection(), ConnectionState::Disconnected);
    }
    t += RECONNECT_MILLIS;
    client.refresh(client.at(t));
    assert!(client.accept_connection());
    assert_eq!(**client.state.store().connection(), ConnectionState::Connected);
}

#[test]
fn teardown_stops_reconnecting() {
    let mut client = TestClient::in_game(White, voice_off());
    client.drop_connection(client.at(0));
    client.state.close_session();
    client.pump();
    for i in 1..5 {
        client.refresh(client.at(i * RECONNECT_MILLIS));
        assert!(!client.has_pending_connection());
    }
    client.state.send_chat("hello");
    client.state.resign();
    assert!(client.take_sent().is_empty());
    assert_eq!(**client.state.store().connection(), ConnectionState::Disconnected);
    assert_eq!(*client.state.store().board().position(), Position::start());
}

#[test]
fn keep_alive_ping() {
    let mut client = TestClient::in_game(White, voice_off());
    client.refresh(client.at(0));
    client.refresh(client.at(29_000));
    assert!(client.take_sent().is_empty());
    client.refresh(client.at(30_000));
    assert_eq!(client.take_sent(), vec![ClientEvent::Ping]);
}

#[test]
fn player_color_follows_server() {
    let mut client = TestClient::in_game(White, voice_off());
    let mut snapshot = snapshot_after(&[]);
    snapshot.player_color = Some(Force::Black);
    client.server_state(snapshot).unwrap();
    assert_eq!(**client.state.store().player_force(), Black);
    assert!(!**client.state.store().is_my_turn());
}
