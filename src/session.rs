//! Top-level session orchestrator.
//!
//! Receives user turns (text or audio), drives context assembly, the LLM
//! gateway, the persona filter, and the speech pipeline, and exposes the
//! session surface consumed by the transport layer.
//!
//! Conversation history and interaction mode are process-wide singletons
//! guarded by async mutexes. That serializes writers, but it also means
//! all concurrent clients share one conversation — a known isolation
//! limitation of the current design. Network and subprocess calls run
//! without holding either lock.

use crate::config::AssistantConfig;
use crate::context::{ContextManager, HistoryStats};
use crate::error::{AssistantError, Result};
use crate::llm::{ChatBackend, HealthStatus, OllamaGateway};
use crate::mode::{ModeMachine, SessionMode, SwitchOutcome};
use crate::persona::{self, PersonaFilter};
use crate::speech::{self, SpeechPipeline};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Coordinates one conversational session end to end.
pub struct SessionOrchestrator {
    backend: Arc<dyn ChatBackend>,
    persona: Arc<PersonaFilter>,
    speech: Arc<SpeechPipeline>,
    context: Mutex<ContextManager>,
    mode: Mutex<ModeMachine>,
}

impl SessionOrchestrator {
    /// Build an orchestrator wired to a real Ollama gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway cannot be constructed.
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let backend: Arc<dyn ChatBackend> = Arc::new(OllamaGateway::new(&config.llm)?);
        let persona = PersonaFilter::new();
        let speech = SpeechPipeline::new(config.speech.clone());
        Ok(Self::with_parts(&config, backend, persona, speech))
    }

    /// Build an orchestrator from pre-wired parts (mocks in tests,
    /// alternative backends elsewhere).
    pub fn with_parts(
        config: &AssistantConfig,
        backend: Arc<dyn ChatBackend>,
        persona: PersonaFilter,
        speech: SpeechPipeline,
    ) -> Self {
        let initial_mode = if config.speech.enabled {
            SessionMode::Voice
        } else {
            SessionMode::Chat
        };
        Self {
            backend,
            persona: Arc::new(persona),
            speech: Arc::new(speech),
            context: Mutex::new(ContextManager::new(config.llm.max_history)),
            mode: Mutex::new(ModeMachine::new(initial_mode)),
        }
    }

    /// Handle one typed turn.
    ///
    /// Mode-switch commands and capability questions are answered without
    /// consulting the model. Gateway failures come back as persona-styled
    /// text with a distinguishing technical suffix; the failed turn is not
    /// recorded.
    ///
    /// # Errors
    ///
    /// [`AssistantError::UserInputEmpty`] when the input is blank.
    pub async fn submit_text_turn(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AssistantError::UserInputEmpty);
        }

        if let Some(target) = speech::detect_mode_switch(trimmed) {
            let mut mode = self.mode.lock().await;
            let reply = mode.acknowledge_detected(target);
            info!(mode = %mode.current(), "mode switch detected in text turn");
            return Ok(reply.to_owned());
        }

        if persona::is_capability_query(trimmed) {
            return Ok(self.persona.handle_capability_query(trimmed));
        }

        let enhanced = self.persona.enhance_prompt(trimmed);
        let context = {
            self.context
                .lock()
                .await
                .build_context(&enhanced, persona::SYSTEM_PROMPT)
        };

        match self.backend.generate(&context).await {
            Ok(raw) => {
                let reply = self.persona.filter(&raw);
                self.context.lock().await.record(&enhanced, &reply);
                Ok(reply)
            }
            Err(e) => {
                warn!("text turn failed: {e}");
                Ok(self.flavored_error(&e))
            }
        }
    }

    /// Handle one spoken turn: returns the reply text and its audio.
    ///
    /// # Errors
    ///
    /// [`AssistantError::UserInputEmpty`] for an empty buffer;
    /// [`AssistantError::Transcription`] when the ASR engine faults.
    /// Everything after transcription degrades inside the speech pipeline.
    pub async fn submit_audio_turn(&self, audio: &[u8]) -> Result<(String, Vec<u8>)> {
        if audio.is_empty() {
            return Err(AssistantError::UserInputEmpty);
        }

        let history = { self.context.lock().await.history_messages() };
        let current_mode = { self.mode.lock().await.current() };

        let turn = self
            .speech
            .speech_to_speech(
                audio,
                self.backend.as_ref(),
                &self.persona,
                &history,
                current_mode,
            )
            .await?;

        if let Some(target) = turn.detected_switch {
            let mut mode = self.mode.lock().await;
            let _ = mode.acknowledge_detected(target);
            info!(mode = %mode.current(), "mode switch detected in voice turn");
        }

        if let Some((user_text, assistant_text)) = &turn.exchange {
            self.context.lock().await.record(user_text, assistant_text);
        }

        Ok((turn.response_text, turn.audio))
    }

    /// Apply an explicit mode switch.
    pub async fn switch_mode(&self, target: SessionMode) -> SwitchOutcome {
        let mut mode = self.mode.lock().await;
        let outcome = mode.request_switch(target);
        info!(mode = %mode.current(), "explicit mode switch");
        outcome
    }

    /// The current interaction mode.
    pub async fn get_mode(&self) -> SessionMode {
        self.mode.lock().await.current()
    }

    /// Drop all recorded exchanges.
    pub async fn clear_history(&self) {
        self.context.lock().await.clear();
        info!("conversation history cleared");
    }

    /// Observability snapshot of the history.
    pub async fn get_stats(&self) -> HistoryStats {
        self.context.lock().await.stats()
    }

    /// Probe the model runtime.
    pub async fn health(&self) -> HealthStatus {
        self.backend.health().await
    }

    /// List models the runtime serves.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.backend.list_models().await
    }

    /// A persona welcome line for newly connected clients.
    pub fn welcome(&self) -> String {
        self.persona.welcome_message()
    }

    /// Eagerly resolve speech engines instead of waiting for the first
    /// voice turn.
    pub async fn warm_up_speech(&self) {
        self.speech.initialize().await;
    }

    /// Persona-styled gateway failure with a distinguishing suffix.
    fn flavored_error(&self, err: &AssistantError) -> String {
        let base = self.persona.error_message();
        let suffix = match err {
            AssistantError::ModelTimeout(secs) => {
                format!("(The language model timed out after {secs} seconds.)")
            }
            AssistantError::ModelUnreachable(_) => {
                "(I can't reach the language model right now.)".to_owned()
            }
            other => format!("(Unexpected model error: {other})"),
        };
        format!("{base} {suffix}")
    }
}
