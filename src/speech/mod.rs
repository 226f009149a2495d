//! Speech pipeline: ASR staging, the synthesizer fallback chain,
//! mode-switch phrase detection, and the full voice turn.
//!
//! The pipeline initializes lazily on first use (or via
//! [`SpeechPipeline::initialize`]): the transcriber is constructed and the
//! TTS candidates are probed once, recording the first responder as the
//! primary engine. Synthesis never hard-fails — stages fall through to the
//! system fallback and ultimately to a silent buffer, because audio out is
//! the terminal leg of a voice turn.

pub mod asr;
pub mod synth;

pub use asr::{CommandTranscriber, Transcriber};
pub use synth::{CommandSynthesizer, EspeakSynthesizer, SilenceSynthesizer, Synthesizer};

use crate::config::SpeechConfig;
use crate::context::ChatMessage;
use crate::error::Result;
use crate::llm::ChatBackend;
use crate::mode::{self, SessionMode};
use crate::persona::{self, PersonaFilter};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Scripted apology used when a voice turn fails after transcription.
pub const APOLOGY_MESSAGE: &str = "I'm sorry, I encountered an error processing your request.";

/// Silence duration for a turn whose transcript came back empty.
const EMPTY_TRANSCRIPT_SILENCE_SECS: f32 = 0.5;
/// Silence duration when a discovered engine errored mid-call.
const ENGINE_ERROR_SILENCE_SECS: f32 = 1.0;
/// Silence per character when no engine produced audio.
const SILENCE_SECS_PER_CHAR: f32 = 0.1;

const CHAT_SWITCH_PHRASES: &[&str] = &[
    "switch to chat",
    "go to chat",
    "chat mode",
    "text mode",
    "switch to text",
    "stop voice",
    "disable voice",
];

const VOICE_SWITCH_PHRASES: &[&str] = &[
    "switch to voice",
    "voice mode",
    "speech mode",
    "talk mode",
    "enable voice",
    "start voice",
];

/// Detect a spoken or typed mode-switch command.
///
/// Case-insensitive substring match; the chat set is checked first.
pub fn detect_mode_switch(text: &str) -> Option<SessionMode> {
    let lower = text.to_lowercase();
    if CHAT_SWITCH_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(SessionMode::Chat);
    }
    if VOICE_SWITCH_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(SessionMode::Voice);
    }
    None
}

/// Result of one full voice turn.
#[derive(Debug)]
pub struct VoiceTurn {
    /// What the ASR engine heard (may be empty).
    pub transcript: String,
    /// The spoken reply text.
    pub response_text: String,
    /// WAV audio of the reply.
    pub audio: Vec<u8>,
    /// A mode switch detected in the transcript, for the orchestrator to
    /// apply.
    pub detected_switch: Option<SessionMode>,
    /// `(user_text, assistant_text)` of a completed LLM exchange, for the
    /// orchestrator to record. `None` for mode-switch, empty-transcript,
    /// and apology turns.
    pub exchange: Option<(String, String)>,
}

/// Engines resolved at initialization.
struct Engines {
    transcriber: Box<dyn Transcriber>,
    chain: Vec<Box<dyn Synthesizer>>,
    /// Whether a probed primary engine heads the chain; controls the
    /// silence duration when the chain is exhausted.
    has_primary: bool,
    silence: SilenceSynthesizer,
}

impl Engines {
    async fn resolve(config: &SpeechConfig) -> Self {
        let timeout = Duration::from_secs(config.tts.timeout_secs);
        let primary = synth::probe_candidates(&config.tts.candidates, timeout).await;
        let has_primary = primary.is_some();
        if !has_primary {
            info!("no TTS candidate responded; relying on system fallback");
        }

        let mut chain: Vec<Box<dyn Synthesizer>> = Vec::with_capacity(2);
        if let Some(engine) = primary {
            chain.push(Box::new(engine));
        }
        chain.push(Box::new(EspeakSynthesizer::new(timeout)));

        Self {
            transcriber: Box::new(CommandTranscriber::new(&config.asr)),
            chain,
            has_primary,
            silence: SilenceSynthesizer::new(config.tts.sample_rate),
        }
    }
}

/// Speech pipeline with lazily resolved engines.
pub struct SpeechPipeline {
    config: SpeechConfig,
    engines: OnceCell<Engines>,
}

impl SpeechPipeline {
    /// Create a pipeline; engines resolve on first use.
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            engines: OnceCell::new(),
        }
    }

    /// Create a pipeline with pre-wired engines, bypassing the probe.
    ///
    /// Used by tests and alternative wirings.
    pub fn with_engines(
        config: SpeechConfig,
        transcriber: Box<dyn Transcriber>,
        chain: Vec<Box<dyn Synthesizer>>,
        has_primary: bool,
    ) -> Self {
        let silence = SilenceSynthesizer::new(config.tts.sample_rate);
        let engines = Engines {
            transcriber,
            chain,
            has_primary,
            silence,
        };
        let cell = OnceCell::new();
        // A fresh cell cannot already be set.
        let _ = cell.set(engines);
        Self {
            config,
            engines: cell,
        }
    }

    /// Resolve engines eagerly instead of on first use.
    pub async fn initialize(&self) {
        let _ = self.engines().await;
    }

    async fn engines(&self) -> &Engines {
        self.engines
            .get_or_init(|| Engines::resolve(&self.config))
            .await
    }

    /// The configured voice identifier.
    pub fn voice(&self) -> &str {
        &self.config.tts.voice
    }

    /// Transcribe a WAV-encoded buffer to text.
    ///
    /// # Errors
    ///
    /// Propagates underlying ASR faults as
    /// [`AssistantError::Transcription`](crate::error::AssistantError::Transcription).
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        self.engines().await.transcriber.transcribe(audio).await
    }

    /// Render text to audio through the fallback chain.
    ///
    /// Empty input returns an empty buffer without invoking any engine.
    /// Stage failures fall through; the terminal silence stage always
    /// produces output, so this never fails.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Vec<u8> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let engines = self.engines().await;
        for stage in &engines.chain {
            match stage.synthesize(text, voice).await {
                Ok(audio) => return audio,
                Err(e) => {
                    warn!(engine = stage.name(), "synthesis stage failed, falling through: {e}");
                }
            }
        }

        let duration = if engines.has_primary {
            ENGINE_ERROR_SILENCE_SECS
        } else {
            SILENCE_SECS_PER_CHAR * text.chars().count() as f32
        };
        engines.silence.render(duration)
    }

    /// Run one full voice turn: transcribe, detect mode switches, consult
    /// the model, filter, and speak the reply.
    ///
    /// Failures after transcription degrade to a scripted apology rendered
    /// to audio instead of propagating.
    ///
    /// # Errors
    ///
    /// Only transcription faults propagate.
    pub async fn speech_to_speech(
        &self,
        audio: &[u8],
        backend: &dyn ChatBackend,
        persona: &PersonaFilter,
        history: &[ChatMessage],
        current_mode: SessionMode,
    ) -> Result<VoiceTurn> {
        let voice = self.config.tts.voice.clone();
        let transcript = self.transcribe(audio).await?;

        if transcript.trim().is_empty() {
            let engines = self.engines().await;
            return Ok(VoiceTurn {
                transcript,
                response_text: String::new(),
                audio: engines.silence.render(EMPTY_TRANSCRIPT_SILENCE_SECS),
                detected_switch: None,
                exchange: None,
            });
        }

        if let Some(target) = detect_mode_switch(&transcript) {
            let reply = mode::detected_ack(current_mode, target);
            let audio = self.synthesize(reply, &voice).await;
            return Ok(VoiceTurn {
                transcript,
                response_text: reply.to_owned(),
                audio,
                detected_switch: Some(target),
                exchange: None,
            });
        }

        let enhanced = persona.enhance_prompt(&transcript);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(persona::SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(enhanced.clone()));

        match backend.generate(&messages).await {
            Ok(raw) => {
                let reply = persona.filter(&raw);
                let audio = self.synthesize(&reply, &voice).await;
                Ok(VoiceTurn {
                    transcript,
                    response_text: reply.clone(),
                    audio,
                    detected_switch: None,
                    exchange: Some((enhanced, reply)),
                })
            }
            Err(e) => {
                warn!("voice turn failed after transcription: {e}");
                let audio = self.synthesize(APOLOGY_MESSAGE, &voice).await;
                Ok(VoiceTurn {
                    transcript,
                    response_text: APOLOGY_MESSAGE.to_owned(),
                    audio,
                    detected_switch: None,
                    exchange: None,
                })
            }
        }
    }
}
