// Opening training and spaced-repetition review. Both are plain request/response loops
// over the REST API; nothing is spoken.

use std::io::{self, BufRead, Write};

use anyhow::anyhow;
use crossterm::style::{Color, Stylize};
use voice_chess::api::{
    ApiRequest, ReviewAnswerResponse, ReviewCompleteResponse, ReviewSkipResponse,
    ReviewStartResponse, TrainingCompleteResponse, TrainingMoveResponse, TrainingStartResponse,
};
use voice_chess::chat::ChatMessageId;
use voice_chess::client::{ClientState, SessionKind};
use voice_chess::force::Force;
use voice_chess::voice::VoiceSettings;

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::tui;


#[derive(Default)]
struct ChatPrinter {
    last_printed: Option<ChatMessageId>,
}

impl ChatPrinter {
    fn flush(&mut self, state: &ClientState) {
        for message in state.chat().messages_after(self.last_printed) {
            println!("{}", tui::render_chat_message(message));
            self.last_printed = Some(message.id);
        }
    }
}

fn silent_client() -> ClientState {
    ClientState::new(VoiceSettings {
        voice_output: false,
        always_on: false,
        ..VoiceSettings::default()
    })
}

// `None` on end of input.
fn prompt(text: &str) -> anyhow::Result<Option<String>> {
    print!("{} ", text.with(Color::Cyan));
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

pub fn run_training(config: &ClientConfig, opening_id: &str) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.server_address)?;
    let mut state = silent_client();
    let mut printer = ChatPrinter::default();
    let token = state.open_session(SessionKind::Training, opening_id.to_owned());
    let response: TrainingStartResponse = api.fetch(&ApiRequest::training_start(opening_id))?;
    state.apply_training_start(&token, response).map_err(|err| anyhow!("{err:?}"))?;

    let session_id = loop {
        printer.flush(&state);
        let Some(training) = state.training() else {
            return Ok(());
        };
        let session_id = training.session_id().to_owned();
        if training.is_complete() {
            break session_id;
        }
        println!(
            "\n{} ({:.0}%)\n{}",
            training.opening().bold(),
            training.progress() * 100.0,
            tui::render_board(training.board().position(), training.player_force(), None)
        );
        let Some(input) = prompt("Your move (/quit to stop):")? else {
            break session_id;
        };
        match input.as_str() {
            "" => {}
            "/quit" => break session_id,
            notation => {
                let response: TrainingMoveResponse =
                    api.fetch(&ApiRequest::training_move(&session_id, notation))?;
                state
                    .apply_training_move(&token, response)
                    .map_err(|err| anyhow!("{err:?}"))?;
            }
        }
    };

    let response: TrainingCompleteResponse =
        api.fetch(&ApiRequest::training_complete(&session_id))?;
    state.apply_training_complete(&token, &response);
    printer.flush(&state);
    println!(
        "Mastery: {}. Sessions today: {}/{}.",
        response.new_mastery_level, response.sessions_today, response.daily_goal
    );
    state.close_session();
    Ok(())
}

pub fn run_review(
    config: &ClientConfig, card_limit: u32, card_type: Option<&str>,
) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.server_address)?;
    let mut state = silent_client();
    let mut printer = ChatPrinter::default();
    let token = state.open_session(SessionKind::Review, "review".to_owned());
    let response: ReviewStartResponse =
        api.fetch(&ApiRequest::review_start(card_limit, card_type))?;
    state.apply_review_start(&token, response);

    let session_id = loop {
        printer.flush(&state);
        let Some(review) = state.review() else {
            return Ok(());
        };
        let session_id = review.session_id().to_owned();
        let Some(card) = review.current_card() else {
            break session_id;
        };
        let perspective = card.fen.split_whitespace().nth(1).map_or(Force::White, |side| {
            if side == "b" { Force::Black } else { Force::White }
        });
        match review.current_position() {
            Some(Ok(position)) => print!("\n{}", tui::render_board(&position, perspective, None)),
            Some(Err(err)) => println!("{}", err.to_string().with(Color::Red)),
            None => {}
        }
        if let Some(theme) = &card.tactical_theme {
            println!("Theme: {theme}");
        }
        println!(
            "Card {} of {}. Score: {} correct, {} incorrect.",
            review.correct_count() + review.incorrect_count() + review.skipped_count() + 1,
            review.total_cards(),
            review.correct_count(),
            review.incorrect_count()
        );
        let Some(input) = prompt("Best move (/skip, /quit):")? else {
            break session_id;
        };
        match input.as_str() {
            "" => {}
            "/quit" => break session_id,
            "/skip" => {
                let response: ReviewSkipResponse =
                    api.fetch(&ApiRequest::review_skip(&session_id))?;
                state.apply_review_skip(&token, response);
            }
            answer => {
                let response: ReviewAnswerResponse =
                    api.fetch(&ApiRequest::review_answer(&session_id, answer))?;
                state
                    .apply_review_answer(&token, answer, response)
                    .map_err(|err| anyhow!("{err:?}"))?;
            }
        }
    };

    let response: ReviewCompleteResponse = api.fetch(&ApiRequest::review_complete(&session_id))?;
    state.apply_review_complete(&token, &response);
    printer.flush(&state);
    if let Some(review) = state.review() {
        for feedback in review.feedback() {
            let mark = if feedback.correct { "✓".with(Color::Green) } else { "✗".with(Color::Red) };
            println!("{mark} {} (expected {}, box {})", feedback.answer, feedback.expected_move, feedback.new_box);
        }
    }
    state.close_session();
    Ok(())
}
