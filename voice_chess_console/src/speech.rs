// Speech output for the console: synthesizes via the server and plays the MP3 with an
// external player process. At most one playback runs at a time.

use std::fs;
use std::process::{Child, Command};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::warn;
use scopeguard::defer;
use voice_chess::api::ApiRequest;
use voice_chess::voice::SpeechRequestId;

use crate::api_client::ApiClient;
use crate::client_main::IncomingEvent;


const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Playback {
    id: SpeechRequestId,
    child: Option<Child>,
}

pub struct SpeechPlayer {
    api: ApiClient,
    player_command: Vec<String>,
    current: Arc<Mutex<Option<Playback>>>,
    next_file_index: u64,
    events: Sender<IncomingEvent>,
}

impl SpeechPlayer {
    pub fn new(api: ApiClient, player_command: Vec<String>, events: Sender<IncomingEvent>) -> Self {
        SpeechPlayer {
            api,
            player_command,
            current: Arc::new(Mutex::new(None)),
            next_file_index: 0,
            events,
        }
    }

    // Starts playback in the background. Completion is reported as an `IncomingEvent`.
    pub fn speak(&mut self, id: SpeechRequestId, text: String, voice: String, rate: String) {
        self.stop();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(Playback { id, child: None });
        }
        let path = std::env::temp_dir().join(format!(
            "voice_chess_{}_{}.mp3",
            std::process::id(),
            self.next_file_index
        ));
        self.next_file_index += 1;
        let api = self.api.clone();
        let player_command = self.player_command.clone();
        let current = Arc::clone(&self.current);
        let events = self.events.clone();
        thread::spawn(move || {
            defer! { let _ = fs::remove_file(&path); }
            let result = (|| -> anyhow::Result<bool> {
                let audio = api.fetch_bytes(&ApiRequest::tts(&text, &voice, &rate))?;
                fs::write(&path, audio)?;
                let (program, args) = player_command
                    .split_first()
                    .ok_or_else(|| anyhow::anyhow!("No audio player configured"))?;
                let child = Command::new(program).args(args).arg(&path).spawn()?;
                {
                    let mut current = current.lock().map_err(|_| anyhow::anyhow!("Poisoned"))?;
                    match current.as_mut() {
                        Some(playback) if playback.id == id => playback.child = Some(child),
                        _ => {
                            // Superseded while synthesizing.
                            let mut child = child;
                            let _ = child.kill();
                            return Ok(false);
                        }
                    }
                }
                loop {
                    thread::sleep(POLL_INTERVAL);
                    let mut current = current.lock().map_err(|_| anyhow::anyhow!("Poisoned"))?;
                    let Some(playback) = current.as_mut().filter(|p| p.id == id) else {
                        return Ok(false);
                    };
                    let Some(child) = playback.child.as_mut() else {
                        return Ok(false);
                    };
                    if let Some(status) = child.try_wait()? {
                        *current = None;
                        if !status.success() {
                            anyhow::bail!("Audio player exited with {status}");
                        }
                        return Ok(true);
                    }
                }
            })();
            let event = match result {
                Ok(true) => IncomingEvent::PlaybackFinished(id),
                Ok(false) => return,
                Err(err) => IncomingEvent::PlaybackFailed(id, err.to_string()),
            };
            let _ = events.send(event);
        });
    }

    pub fn stop(&mut self) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if let Some(mut playback) = current.take() {
            if let Some(child) = playback.child.as_mut() {
                if let Err(err) = child.kill() {
                    warn!("Cannot stop audio player: {err}");
                }
                let _ = child.wait();
            }
        }
    }
}

impl Drop for SpeechPlayer {
    fn drop(&mut self) { self.stop(); }
}
