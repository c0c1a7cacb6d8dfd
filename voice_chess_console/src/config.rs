use anyhow::Context;
use serde::{Deserialize, Serialize};
use voice_chess::force::Force;
use voice_chess::voice::{DEFAULT_VOICE, VoiceSettings};


pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8766";
pub const DEFAULT_SESSION_ID: &str = "default";

// Settings of the console client. Read from an optional YAML file; command line flags win.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // "host:port" of the game server. Both the REST API and the game channel live there.
    pub server_address: String,
    pub session_id: String,
    pub player_color: Force,
    pub model: Option<String>,
    pub voice: String,
    pub rate_percent: i32,
    pub voice_output: bool,
    pub always_on: bool,
    // Command that plays an MP3 file. The file path is appended as the last argument.
    pub audio_player: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_address: DEFAULT_SERVER_ADDRESS.to_owned(),
            session_id: DEFAULT_SESSION_ID.to_owned(),
            player_color: Force::White,
            model: None,
            voice: DEFAULT_VOICE.to_owned(),
            rate_percent: 0,
            voice_output: true,
            always_on: false,
            audio_player: vec!["mpv".to_owned(), "--no-video".to_owned(), "--really-quiet".to_owned()],
        }
    }
}

impl ClientConfig {
    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            voice_output: self.voice_output && !self.audio_player.is_empty(),
            always_on: self.always_on,
            voice: self.voice.clone(),
            rate_percent: self.rate_percent,
        }
    }
}

pub fn read_config_file(filename: &str) -> anyhow::Result<ClientConfig> {
    let contents = std::fs::read_to_string(filename)
        .with_context(|| format!("Failed to read config file '{filename}'."))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{filename}'."))
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_yaml() {
        let config: ClientConfig =
            serde_yaml::from_str("player_color: black\nvoice: amy\nrate_percent: -10\n").unwrap();
        assert_eq!(config.player_color, Force::Black);
        assert_eq!(config.server_address, DEFAULT_SERVER_ADDRESS);
        assert_eq!(config.voice_settings().rate_string(), "-10%");
    }
}
