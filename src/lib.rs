//! Aria: persona-driven conversational assistant backend.
//!
//! Mediates between chat/voice clients and a local Ollama-compatible LLM
//! runtime. A turn flows through the pipeline:
//! transport → orchestrator → {speech (audio in) → context → LLM gateway →
//! persona filter → speech (voice out)} → transport.
//!
//! # Architecture
//!
//! - **Context manager** ([`context`]): bounded exchange log and prompt
//!   assembly.
//! - **LLM gateway** ([`llm`]): chat completions against the runtime's
//!   native API, with timeout/connection/protocol failure taxonomy.
//! - **Persona filter** ([`persona`]): deterministic-under-seed text
//!   transforms applied to model output and canned responses.
//! - **Speech pipeline** ([`speech`]): ASR staging and an ordered
//!   synthesizer fallback chain terminating in a silent buffer.
//! - **Mode machine** ([`mode`]): the voice↔chat session state.
//! - **Session orchestrator** ([`session`]): wires the above behind the
//!   surface the transport ([`server`]) exposes.

pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod mode;
pub mod persona;
pub mod server;
pub mod session;
pub mod speech;

pub use config::AssistantConfig;
pub use context::{ChatMessage, ContextManager, Exchange, HistoryStats};
pub use error::{AssistantError, Result};
pub use llm::{ChatBackend, HealthStatus, OllamaGateway};
pub use mode::{ModeMachine, SessionMode, SwitchOutcome};
pub use persona::PersonaFilter;
pub use session::SessionOrchestrator;
pub use speech::SpeechPipeline;
