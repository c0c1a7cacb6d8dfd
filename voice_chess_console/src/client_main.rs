// Interactive console client. Threads feed an mpsc channel (game channel frames, stdin lines,
// playback completions, ticks); the main thread owns `ClientState` and executes the commands
// it produces.

use std::io::{self, BufRead};
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::style::{Color, Stylize};
use instant::Instant;
use log::{info, warn};
use tungstenite::WebSocket;
use voice_chess::altered_board::MoveInputResult;
use voice_chess::api::{ApiRequest, NewGameResponse};
use voice_chess::chat::ChatMessageId;
use voice_chess::client::{ClientState, NotableEvent, SessionKind};
use voice_chess::connection::{ChannelId, ConnectionCommand};
use voice_chess::coord::Coord;
use voice_chess::force::Force;
use voice_chess::once_cell_regex;
use voice_chess::voice::{SpeechRequestId, VoiceCommand};

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::network;
use crate::speech::SpeechPlayer;
use crate::tui;


const TICK_INTERVAL: Duration = Duration::from_millis(100);

const HELP: &str = "\
Commands:
  e2e4            make a move
  /click <sq>     click a square
  /undo           take back the last move pair
  /resign         resign the game
  /new [color]    start a new game
  /say <text>     speak to the assistant (simulated speech recognition)
  /listen /stop   start or stop listening
  /always-on on|off
  /voice on|off   speech output
  /skip           stop the current speech
  /board          show the board
  /quit
Anything else is sent to the assistant as a chat message.";

pub enum IncomingEvent {
    ChannelOpen(ChannelId, WebSocket<TcpStream>),
    ChannelMessage(ChannelId, String),
    ChannelClosed(ChannelId),
    Input(String),
    PlaybackFinished(SpeechRequestId),
    PlaybackFailed(SpeechRequestId, String),
    Tick,
}

enum InputReaction {
    Continue,
    Exit,
}

struct ConsoleClient {
    config: ClientConfig,
    state: ClientState,
    api: ApiClient,
    speech: SpeechPlayer,
    socket_out: Option<(ChannelId, WebSocket<TcpStream>)>,
    events: mpsc::Sender<IncomingEvent>,
    last_printed_message: Option<ChatMessageId>,
}

pub fn run(config: ClientConfig, start_new_game: bool) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.server_address)?;
    let session_id = if start_new_game {
        let response: NewGameResponse = api.fetch(&ApiRequest::new_game(
            config.player_color,
            config.model.as_deref(),
        ))?;
        info!("Started game {}", response.game_id);
        response.game_id
    } else {
        config.session_id.clone()
    };

    let (tx, rx) = mpsc::channel();
    let tx_local = tx.clone();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx_local.send(IncomingEvent::Input(line)).is_err() {
                break;
            }
        }
    });
    let tx_tick = tx.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(TICK_INTERVAL);
            if tx_tick.send(IncomingEvent::Tick).is_err() {
                break;
            }
        }
    });

    let speech = SpeechPlayer::new(api.clone(), config.audio_player.clone(), tx.clone());
    let mut state = ClientState::new(config.voice_settings());
    let store = state.store_mut();
    store.subscribe_connection(|connection| {
        println!("{}", format!("[{connection:?}]").with(Color::DarkGrey));
    });
    store.subscribe_voice(|voice| {
        println!("{}", format!("[{voice:?}]").with(Color::DarkGrey));
    });
    let mut client = ConsoleClient {
        config,
        state,
        api,
        speech,
        socket_out: None,
        events: tx,
        last_printed_message: None,
    };
    client.state.open_session(SessionKind::Game, session_id);
    println!("{HELP}");
    client.flush();

    for event in rx {
        match client.apply_event(event) {
            InputReaction::Continue => {}
            InputReaction::Exit => break,
        }
        client.state.refresh(Instant::now());
        client.flush();
    }
    client.state.close_session();
    client.flush();
    Ok(())
}

impl ConsoleClient {
    fn apply_event(&mut self, event: IncomingEvent) -> InputReaction {
        match event {
            IncomingEvent::ChannelOpen(channel, socket) => {
                self.socket_out = Some((channel, socket));
                self.state.on_channel_open(channel);
            }
            IncomingEvent::ChannelMessage(channel, text) => {
                match self.state.on_channel_message(channel, &text) {
                    Ok(NotableEvent::GameOver(notice)) => {
                        println!("{}", notice.message.bold());
                    }
                    Ok(_) => {}
                    Err(err) => warn!("{err:?}"),
                }
            }
            IncomingEvent::ChannelClosed(channel) => {
                if self.socket_out.as_ref().is_some_and(|(c, _)| *c == channel) {
                    self.socket_out = None;
                }
                self.state.on_channel_close(channel, Instant::now());
            }
            IncomingEvent::Input(line) => return self.process_input(line.trim()),
            IncomingEvent::PlaybackFinished(id) => self.state.on_playback_finished(id),
            IncomingEvent::PlaybackFailed(id, reason) => self.state.on_playback_failed(id, &reason),
            IncomingEvent::Tick => {}
        }
        InputReaction::Continue
    }

    fn process_input(&mut self, input: &str) -> InputReaction {
        let move_re = once_cell_regex!(r"^([a-h][1-8])[\s-]*([a-h][1-8])$");
        if input.is_empty() {
            return InputReaction::Continue;
        }
        if let Some(caps) = move_re.captures(input) {
            let from = Coord::from_algebraic(&caps[1]);
            let to = Coord::from_algebraic(&caps[2]);
            if let (Some(from), Some(to)) = (from, to) {
                let result = self.state.make_move(from, to);
                report_move_input(result);
            }
            return InputReaction::Continue;
        }
        let Some(command) = input.strip_prefix('/') else {
            self.state.send_chat(input);
            return InputReaction::Continue;
        };
        let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
        let arg = arg.trim();
        match name {
            "quit" => return InputReaction::Exit,
            "help" => println!("{HELP}"),
            "board" => self.print_board(),
            "undo" => self.state.request_undo(),
            "resign" => self.state.resign(),
            "new" => {
                let force = match arg {
                    "" => self.config.player_color,
                    "white" => Force::White,
                    "black" => Force::Black,
                    _ => {
                        print_error(format!("Unknown color: '{arg}'"));
                        return InputReaction::Continue;
                    }
                };
                self.state.new_game(force, self.config.model.clone());
            }
            "click" => match Coord::from_algebraic(arg) {
                Some(coord) => report_move_input(self.state.click_square(coord)),
                None => print_error(format!("Bad square: '{arg}'")),
            },
            "say" => {
                // Stand-in for the recognition engine: one finalized utterance.
                let now = Instant::now();
                if !self.state.voice().is_listening() && !self.state.start_listening() {
                    print_error("Voice input is not available right now".to_owned());
                    return InputReaction::Continue;
                }
                self.state.on_recognition_result(arg, true, now);
                if !self.state.voice().is_always_on() {
                    self.state.on_recognition_ended(now);
                }
            }
            "listen" => {
                if !self.state.start_listening() {
                    print_error("Voice input is not available right now".to_owned());
                }
            }
            "stop" => self.state.stop_listening(),
            "skip" => self.state.skip_speech(),
            "voice" => match parse_on_off(arg) {
                Some(on) => self.state.set_voice_output(on),
                None => print_error(format!("Expected on/off, got '{arg}'")),
            },
            "always-on" => match parse_on_off(arg) {
                Some(on) => {
                    if !self.state.set_always_on(on) {
                        print_error("Voice input is disabled for this session".to_owned());
                    }
                }
                None => print_error(format!("Expected on/off, got '{arg}'")),
            },
            _ => print_error(format!("Unknown command: '{name}'")),
        }
        InputReaction::Continue
    }

    // Executes pending commands and prints whatever changed.
    fn flush(&mut self) {
        loop {
            let mut idle = true;
            while let Some(command) = self.state.next_connection_command() {
                idle = false;
                self.execute_connection_command(command);
            }
            while let Some(command) = self.state.next_voice_command() {
                idle = false;
                self.execute_voice_command(command);
            }
            if idle {
                break;
            }
        }
        let store = self.state.store();
        let board_dirty = store.board().take_dirt() | store.overlay().take_dirt();
        let last_move_dirty = store.last_move().take_dirt();
        if board_dirty || last_move_dirty {
            self.print_board();
        }
        for message in self.state.chat().messages_after(self.last_printed_message) {
            println!("{}", tui::render_chat_message(message));
            self.last_printed_message = Some(message.id);
        }
    }

    fn print_board(&self) {
        let store = self.state.store();
        print!(
            "\n{}",
            tui::render_board(store.displayed_position(), **store.player_force(), **store.last_move())
        );
        if store.overlay().is_some() {
            println!("{}", "(waiting for the server)".with(Color::DarkGrey));
        } else if **store.is_my_turn() && !store.is_game_over() {
            println!("{}", "Your move.".bold());
        }
    }

    fn execute_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Open { channel, session_id } => {
                let server_address = self.config.server_address.clone();
                let events = self.events.clone();
                thread::spawn(move || run_channel(server_address, session_id, channel, events));
            }
            ConnectionCommand::Send { channel, text } => {
                let Some((open_channel, socket)) = self.socket_out.as_mut() else {
                    return;
                };
                if *open_channel != channel {
                    return;
                }
                if let Err(err) = network::write_text(socket, text) {
                    warn!("Cannot send to the game server: {err}");
                    self.socket_out = None;
                    self.state.on_channel_close(channel, Instant::now());
                }
            }
            ConnectionCommand::Close { channel } => {
                if let Some((open_channel, mut socket)) = self.socket_out.take() {
                    if open_channel == channel {
                        let _ = socket.close(None);
                        let _ = socket.flush();
                    } else {
                        self.socket_out = Some((open_channel, socket));
                    }
                }
            }
        }
    }

    fn execute_voice_command(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Speak { id, text, voice, rate } => {
                self.speech.speak(id, text, voice, rate);
            }
            VoiceCommand::StopPlayback => self.speech.stop(),
            VoiceCommand::StartRecognition | VoiceCommand::StopRecognition => {
                // Recognition is simulated with `/say`.
            }
        }
    }
}

// Runs in its own thread for the lifetime of one channel.
fn run_channel(
    server_address: String, session_id: String, channel: ChannelId,
    events: mpsc::Sender<IncomingEvent>,
) {
    let mut socket_in = match network::connect(&server_address, &session_id) {
        Ok(socket) => socket,
        Err(err) => {
            warn!("Cannot connect to {server_address}: {err}");
            let _ = events.send(IncomingEvent::ChannelClosed(channel));
            return;
        }
    };
    let socket_out = match network::clone_websocket(&socket_in) {
        Ok(socket) => socket,
        Err(err) => {
            warn!("Cannot clone socket: {err}");
            let _ = events.send(IncomingEvent::ChannelClosed(channel));
            return;
        }
    };
    if events.send(IncomingEvent::ChannelOpen(channel, socket_out)).is_err() {
        return;
    }
    loop {
        match network::read_text(&mut socket_in) {
            Ok(text) => {
                if events.send(IncomingEvent::ChannelMessage(channel, text)).is_err() {
                    return;
                }
            }
            Err(err) => {
                info!("Game channel closed: {err}");
                let _ = events.send(IncomingEvent::ChannelClosed(channel));
                return;
            }
        }
    }
}

fn report_move_input(result: MoveInputResult) {
    match result {
        MoveInputResult::Move(_) | MoveInputResult::Noop => {}
        MoveInputResult::Error(err) => print_error(format!("Cannot move: {err:?}")),
    }
}

fn parse_on_off(s: &str) -> Option<bool> {
    match s {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn print_error(message: String) {
    println!("{}", message.with(Color::Red));
}
