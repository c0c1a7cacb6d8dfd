// Voice turn controller: decides when the microphone listens and when the assistant speaks.
//
// Rules:
//   - Listening and speaking never overlap. Speaking preempts listening; starting to listen
//     stops any playback first. The microphone must never hear our own speech.
//   - While the AI is thinking, listening is stopped and is not restarted. Playback that is
//     already going on continues: the reply is normally announced before thinking ends.
//   - In always-on mode listening resumes on its own whenever nothing above prevents it.
//   - Recognized speech is collected into a transcript that is submitted after a pause.
//
// Like the rest of the core, the controller does no IO. It emits `VoiceCommand`s for the
// driver (recognition engine, audio output) and `VoiceNotice`s for the session.

use std::collections::VecDeque;
use std::time::Duration;

use instant::Instant;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::speech_text::sanitize_for_speech;


// Pause after the last recognized speech that ends an utterance.
pub const SILENCE_TIMEOUT: Duration = Duration::from_millis(1500);

pub const DEFAULT_VOICE: &str = "ryan";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTurnState {
    Idle,
    Listening,
    Speaking,
    Thinking,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VoiceSettings {
    // Speak assistant messages aloud.
    pub voice_output: bool,
    // Restart listening automatically after speaking or thinking.
    pub always_on: bool,
    pub voice: String,
    // Speech rate adjustment in percent, e.g. -10 for slightly slower speech.
    pub rate_percent: i32,
}

// Error kinds as reported by the speech recognition engine.
#[derive(Clone, PartialEq, Eq, Debug, EnumString)]
pub enum RecognitionErrorKind {
    #[strum(serialize = "no-speech")]
    NoSpeech,
    #[strum(serialize = "aborted")]
    Aborted,
    #[strum(serialize = "audio-capture")]
    AudioCapture,
    #[strum(serialize = "network")]
    Network,
    #[strum(serialize = "not-allowed")]
    NotAllowed,
    #[strum(serialize = "service-not-allowed")]
    ServiceNotAllowed,
    #[strum(default)]
    Other(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SpeechRequestId(u64);

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum VoiceCommand {
    StartRecognition,
    StopRecognition,
    // Synthesize and play. Completion must be reported with the same id.
    Speak {
        id: SpeechRequestId,
        text: String,
        voice: String,
        rate: String,
    },
    StopPlayback,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum VoiceNotice {
    // The user finished an utterance. It should be sent as a chat message.
    TranscriptReady(String),
    // Microphone access was refused. Voice input is off for the rest of the session.
    PermissionDenied,
}

#[derive(Debug)]
pub struct VoiceController {
    settings: VoiceSettings,
    listening: bool,
    speaking: Option<SpeechRequestId>,
    thinking: bool,
    permission_denied: bool,
    transcript: Vec<String>,
    silence_deadline: Option<Instant>,
    next_speech_id: u64,
    commands: VecDeque<VoiceCommand>,
    notices: VecDeque<VoiceNotice>,
}

impl RecognitionErrorKind {
    pub fn is_permission_error(&self) -> bool {
        matches!(self, RecognitionErrorKind::NotAllowed | RecognitionErrorKind::ServiceNotAllowed)
    }
}

impl SpeechRequestId {
    pub fn to_raw(self) -> u64 { self.0 }
    pub fn from_raw(raw: u64) -> Self { SpeechRequestId(raw) }
}

impl VoiceSettings {
    // Rate in the form the synthesis service expects: "+0%", "-10%".
    pub fn rate_string(&self) -> String { format!("{:+}%", self.rate_percent) }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        VoiceSettings {
            voice_output: true,
            always_on: false,
            voice: DEFAULT_VOICE.to_owned(),
            rate_percent: 0,
        }
    }
}

impl VoiceController {
    pub fn new(settings: VoiceSettings) -> Self {
        VoiceController {
            settings,
            listening: false,
            speaking: None,
            thinking: false,
            permission_denied: false,
            transcript: Vec::new(),
            silence_deadline: None,
            next_speech_id: 0,
            commands: VecDeque::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &VoiceSettings { &self.settings }
    pub fn is_listening(&self) -> bool { self.listening }
    pub fn is_speaking(&self) -> bool { self.speaking.is_some() }
    pub fn is_always_on(&self) -> bool { self.settings.always_on }
    pub fn pending_transcript(&self) -> String { self.transcript.join(" ") }
    pub fn silence_deadline(&self) -> Option<Instant> { self.silence_deadline }

    pub fn state(&self) -> VoiceTurnState {
        if self.speaking.is_some() {
            VoiceTurnState::Speaking
        } else if self.thinking {
            VoiceTurnState::Thinking
        } else if self.listening {
            VoiceTurnState::Listening
        } else {
            VoiceTurnState::Idle
        }
    }

    // Starts always-on listening if it is enabled. Called once the game screen is ready.
    pub fn activate(&mut self) { self.maybe_resume_listening(); }

    pub fn set_voice_output(&mut self, enabled: bool) {
        self.settings.voice_output = enabled;
        if !enabled {
            self.skip();
        }
    }

    // Returns false if voice input has been disabled for this session.
    pub fn set_always_on(&mut self, enabled: bool) -> bool {
        if enabled && self.permission_denied {
            return false;
        }
        self.settings.always_on = enabled;
        if enabled {
            self.maybe_resume_listening();
        } else {
            self.stop_listening();
        }
        true
    }

    pub fn set_voice(&mut self, voice: String, rate_percent: i32) {
        self.settings.voice = voice;
        self.settings.rate_percent = rate_percent;
    }

    // Push-to-talk. Stops playback, since the two never overlap.
    pub fn start_listening(&mut self) -> bool {
        if self.thinking || self.permission_denied {
            return false;
        }
        self.stop_playback();
        self.begin_recognition();
        true
    }

    pub fn stop_listening(&mut self) {
        if self.listening {
            self.listening = false;
            self.commands.push_back(VoiceCommand::StopRecognition);
        }
    }

    pub fn set_thinking(&mut self, thinking: bool) {
        if self.thinking == thinking {
            return;
        }
        self.thinking = thinking;
        if thinking {
            self.stop_listening();
        } else {
            self.maybe_resume_listening();
        }
    }

    // Speaks an assistant message. Returns the request id, or `None` if nothing is spoken
    // (voice output off or no readable text).
    pub fn speak(&mut self, text: &str) -> Option<SpeechRequestId> {
        if !self.settings.voice_output {
            return None;
        }
        let text = sanitize_for_speech(text);
        if text.is_empty() {
            return None;
        }
        self.stop_listening();
        self.stop_playback();
        let id = SpeechRequestId(self.next_speech_id);
        self.next_speech_id += 1;
        self.speaking = Some(id);
        self.commands.push_back(VoiceCommand::Speak {
            id,
            text,
            voice: self.settings.voice.clone(),
            rate: self.settings.rate_string(),
        });
        Some(id)
    }

    // Playback ended normally. Completions of superseded requests are ignored.
    pub fn on_playback_finished(&mut self, id: SpeechRequestId) {
        if self.speaking == Some(id) {
            self.speaking = None;
            self.maybe_resume_listening();
        }
    }

    pub fn on_playback_failed(&mut self, id: SpeechRequestId, reason: &str) {
        if self.speaking == Some(id) {
            warn!("Speech playback failed: {reason}");
            self.speaking = None;
            self.maybe_resume_listening();
        }
    }

    // Cuts the current speech short and goes back to listening in always-on mode.
    pub fn skip(&mut self) {
        if self.speaking.is_some() {
            self.stop_playback();
            self.maybe_resume_listening();
        }
    }

    pub fn on_recognition_result(&mut self, text: &str, is_final: bool, now: Instant) {
        if !self.listening {
            debug!("Ignoring speech while not listening: {text:?}");
            return;
        }
        if is_final {
            let text = text.trim();
            if !text.is_empty() {
                self.transcript.push(text.to_owned());
            }
            if !self.transcript.is_empty() {
                self.silence_deadline = Some(now + SILENCE_TIMEOUT);
            }
        } else if !self.transcript.is_empty() {
            // Still talking: the silence timer restarts. It stays armed for as long as there
            // is something to submit, so the fragments survive listening being cut off.
            self.silence_deadline = Some(now + SILENCE_TIMEOUT);
        }
    }

    // The engine stopped on its own (it does so after a while even in continuous mode).
    pub fn on_recognition_ended(&mut self, now: Instant) {
        if !self.listening {
            return;
        }
        self.listening = false;
        if !self.transcript.is_empty() && self.silence_deadline.is_none() {
            self.silence_deadline = Some(now + SILENCE_TIMEOUT);
        }
        self.maybe_resume_listening();
    }

    pub fn on_recognition_error(&mut self, kind: RecognitionErrorKind) {
        match kind {
            RecognitionErrorKind::NoSpeech => {
                // Transient: nothing was said for a while.
                self.listening = false;
                self.maybe_resume_listening();
            }
            RecognitionErrorKind::Aborted => {
                debug!("Speech recognition aborted");
            }
            kind if kind.is_permission_error() => {
                info!("Microphone access denied, disabling voice input");
                self.listening = false;
                self.settings.always_on = false;
                if !self.permission_denied {
                    self.permission_denied = true;
                    self.notices.push_back(VoiceNotice::PermissionDenied);
                }
            }
            kind => {
                warn!("Speech recognition error: {kind:?}");
                self.listening = false;
            }
        }
    }

    // Fires the silence timer.
    pub fn refresh(&mut self, now: Instant) {
        if let Some(deadline) = self.silence_deadline {
            if now >= deadline {
                self.silence_deadline = None;
                let transcript = self.transcript.join(" ");
                self.transcript.clear();
                if !transcript.trim().is_empty() {
                    self.notices.push_back(VoiceNotice::TranscriptReady(transcript));
                }
            }
        }
    }

    // Stops everything. Nothing is restarted afterwards.
    pub fn teardown(&mut self) {
        self.settings.always_on = false;
        self.stop_listening();
        self.stop_playback();
        self.thinking = false;
        self.transcript.clear();
        self.silence_deadline = None;
    }

    // Reinstates the user's settings after `teardown`. A refused microphone stays refused.
    pub fn restore_settings(&mut self, settings: VoiceSettings) {
        self.settings = settings;
        if self.permission_denied {
            self.settings.always_on = false;
        }
    }

    pub fn next_command(&mut self) -> Option<VoiceCommand> { self.commands.pop_front() }
    pub fn next_notice(&mut self) -> Option<VoiceNotice> { self.notices.pop_front() }

    fn begin_recognition(&mut self) {
        debug_assert!(self.speaking.is_none());
        if !self.listening {
            self.listening = true;
            self.commands.push_back(VoiceCommand::StartRecognition);
        }
    }

    fn stop_playback(&mut self) {
        if self.speaking.take().is_some() {
            self.commands.push_back(VoiceCommand::StopPlayback);
        }
    }

    fn maybe_resume_listening(&mut self) {
        if self.settings.always_on
            && !self.permission_denied
            && !self.thinking
            && self.speaking.is_none()
        {
            self.begin_recognition();
        }
    }
}
