// Legend for various fix-this comments:
//   * "TODO" - bug or missing crucial feature.
//   * "Improvement potential" - missing nice-to-have feature or an opportunity
//       to make code better or faster.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod network;
pub mod tui;

mod api_client;
mod client_main;
mod config;
mod drill_main;
mod speech;

use std::str::FromStr;

use anyhow::anyhow;
use api_client::ApiClient;
use clap::{ArgMatches, Command, arg};
use config::ClientConfig;
use voice_chess::api::ApiRequest;
use voice_chess::force::Force;


fn server_arg() -> clap::Arg {
    arg!(-'s' --"server" <address> "Server address, host:port")
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ClientConfig> {
    let mut config = match matches.try_get_one::<String>("config").ok().flatten() {
        Some(path) => config::read_config_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(server) = matches.get_one::<String>("server") {
        config.server_address = server.clone();
    }
    Ok(config)
}

fn print_json(config: &ClientConfig, request: &ApiRequest) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.server_address)?;
    let value = api.fetch_json(request)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("tungstenite", log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let info_command = |name: &'static str, about: &'static str| {
        Command::new(name).about(about).arg(server_arg())
    };
    let matches = Command::new("Voice Chess")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .about("Console client for the voice chess server")
        .subcommand_required(true)
        .subcommand(
            Command::new("play")
                .about("Play against the AI")
                .arg(arg!(-'c' --"config" <file> "Path to the configuration file: yaml-serialized ClientConfig."))
                .arg(server_arg())
                .arg(arg!(--"session" <id> "Game session ID"))
                .arg(arg!(--"color" <color> "Your color").value_parser(["white", "black"]))
                .arg(arg!(--"model" <model> "AI model to play against"))
                .arg(arg!(--"voice" <voice> "Voice for speech output"))
                .arg(
                    arg!(--"rate" <percent> "Speech rate adjustment in percent")
                        .value_parser(clap::value_parser!(i32).range(-50..=100))
                        .allow_negative_numbers(true),
                )
                .arg(arg!(--"no-voice" "Do not speak assistant messages"))
                .arg(arg!(--"always-on" "Keep listening between turns"))
                .arg(arg!(--"new" "Ask the server to start a new game first")),
        )
        .subcommand(info_command("health", "Check server health"))
        .subcommand(info_command("models", "List available AI models"))
        .subcommand(info_command("voices", "List available voices"))
        .subcommand(info_command("stats", "Show game statistics"))
        .subcommand(info_command("openings", "List openings available for training"))
        .subcommand(info_command("review-stats", "Show review card statistics"))
        .subcommand(
            info_command("delete-game", "Delete a stored game")
                .arg(arg!(<game_id> "Game ID")),
        )
        .subcommand(
            Command::new("train")
                .about("Train an opening")
                .arg(server_arg())
                .arg(arg!(<opening_id> "Opening ID, see `openings`")),
        )
        .subcommand(
            Command::new("review")
                .about("Review due positions")
                .arg(server_arg())
                .arg(
                    arg!(-'n' --"limit" <n> "Maximum number of cards")
                        .value_parser(clap::value_parser!(u32).range(1..=100))
                        .default_value("10"),
                )
                .arg(arg!(--"card-type" <type> "Only review cards of this type")),
        )
        .get_matches();

    let (name, sub_matches) = matches.subcommand().ok_or_else(|| anyhow!("No command"))?;
    let mut config = load_config(sub_matches)?;
    match name {
        "play" => {
            if let Some(session) = sub_matches.get_one::<String>("session") {
                config.session_id = session.clone();
            }
            if let Some(color) = sub_matches.get_one::<String>("color") {
                config.player_color = Force::from_str(color)?;
            }
            if let Some(model) = sub_matches.get_one::<String>("model") {
                config.model = Some(model.clone());
            }
            if let Some(voice) = sub_matches.get_one::<String>("voice") {
                config.voice = voice.clone();
            }
            if let Some(&rate) = sub_matches.get_one::<i32>("rate") {
                config.rate_percent = rate;
            }
            if sub_matches.get_flag("no-voice") {
                config.voice_output = false;
            }
            if sub_matches.get_flag("always-on") {
                config.always_on = true;
            }
            client_main::run(config, sub_matches.get_flag("new"))
        }
        "health" => print_json(&config, &ApiRequest::health()),
        "models" => print_json(&config, &ApiRequest::models()),
        "voices" => print_json(&config, &ApiRequest::voices()),
        "stats" => print_json(&config, &ApiRequest::stats()),
        "openings" => print_json(&config, &ApiRequest::openings()),
        "review-stats" => print_json(&config, &ApiRequest::review_stats()),
        "delete-game" => {
            let game_id = sub_matches
                .get_one::<String>("game_id")
                .ok_or_else(|| anyhow!("Missing game ID"))?;
            print_json(&config, &ApiRequest::delete_game(game_id))
        }
        "train" => {
            let opening_id = sub_matches
                .get_one::<String>("opening_id")
                .ok_or_else(|| anyhow!("Missing opening ID"))?;
            drill_main::run_training(&config, opening_id)
        }
        "review" => {
            let limit = sub_matches.get_one::<u32>("limit").copied().unwrap_or(10);
            let card_type = sub_matches.get_one::<String>("card-type").map(String::as_str);
            drill_main::run_review(&config, limit, card_type)
        }
        _ => Err(anyhow!("Unknown command: {name}")),
    }
}
