//! Configuration types for the assistant backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// HTTP transport settings.
    pub server: ServerConfig,
    /// Language model runtime settings.
    pub llm: LlmConfig,
    /// Speech pipeline settings (ASR + TTS).
    pub speech: SpeechConfig,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Language model runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama-compatible runtime.
    pub base_url: String,
    /// Model name to request (must appear in the runtime's tag list).
    pub model: String,
    /// Deadline in seconds for a chat-completion request.
    pub request_timeout_secs: u64,
    /// Deadline in seconds for health probes and model listing.
    pub probe_timeout_secs: u64,
    /// Maximum number of exchanges retained for prompt context.
    pub max_history: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            // Ollama default endpoint.
            base_url: "http://localhost:11434".to_owned(),
            model: "llama3.2:3b".to_owned(),
            request_timeout_secs: 60,
            probe_timeout_secs: 5,
            max_history: 10,
        }
    }
}

/// Speech pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether speech is enabled. When disabled the session defaults to
    /// chat mode; the pipeline itself still initializes lazily on demand.
    pub enabled: bool,
    /// Speech-to-text engine settings.
    pub asr: AsrConfig,
    /// Text-to-speech engine settings.
    pub tts: TtsConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            asr: AsrConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

/// Speech-to-text (ASR) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrConfig {
    /// Transcriber executable invoked per segment.
    pub program: String,
    /// Optional model path passed to the transcriber via `-m`.
    pub model_path: Option<PathBuf>,
    /// Bounded wait in seconds before the transcriber process is killed.
    pub timeout_secs: u64,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            program: "whisper-cli".to_owned(),
            model_path: None,
            timeout_secs: 60,
        }
    }
}

/// Text-to-speech (TTS) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Candidate synthesizer executables probed in order at startup.
    /// The first one that answers a `--help` probe becomes the primary
    /// engine; all invocations use the `--text/--output/--voice` contract.
    pub candidates: Vec<String>,
    /// Voice identifier passed to the synthesizer.
    pub voice: String,
    /// Bounded wait in seconds before a synthesizer process is killed.
    pub timeout_secs: u64,
    /// Sample rate of generated silence buffers in Hz.
    pub sample_rate: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["kokoro".to_owned(), "piper".to_owned()],
            voice: "default".to_owned(),
            timeout_secs: 20,
            sample_rate: 16_000,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/aria/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("aria").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("aria")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/aria-config/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AssistantConfig::default();
        assert!(!config.server.host.is_empty());
        assert!(config.server.port > 0);
        assert!(!config.llm.base_url.is_empty());
        assert!(!config.llm.model.is_empty());
        assert_eq!(config.llm.request_timeout_secs, 60);
        assert_eq!(config.llm.probe_timeout_secs, 5);
        assert_eq!(config.llm.max_history, 10);
        assert!(config.speech.enabled);
        assert!(!config.speech.asr.program.is_empty());
        assert!(!config.speech.tts.candidates.is_empty());
        assert!(config.speech.tts.sample_rate > 0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("aria-test-config-roundtrip");
        let path = dir.join("config.toml");

        let mut config = AssistantConfig::default();
        config.llm.model = "mistral:7b".to_owned();
        config.llm.max_history = 4;
        config.speech.enabled = false;

        assert!(config.save_to_file(&path).is_ok());
        assert!(path.exists());

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.llm.model, "mistral:7b");
        assert_eq!(loaded.llm.max_history, 4);
        assert!(!loaded.speech.enabled);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result =
            AssistantConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("aria-test-config-invalid");
        let path = dir.join("bad.toml");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(&path, "this is not valid toml {{{").ok();

        let result = AssistantConfig::from_file(&path);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
[llm]
model = "qwen2:7b"
"#;
        let config: AssistantConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model, "qwen2:7b");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.max_history, 10);
        assert!(config.speech.enabled);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = AssistantConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("aria"));
    }
}
