//! Speech-to-text over an external transcriber process.
//!
//! Inbound audio is staged into a scoped temp WAV and handed to the
//! configured transcriber executable (whisper-style CLI). Unlike
//! synthesis, transcription faults propagate: the caller needs to know
//! the turn could not be understood.

use crate::config::AsrConfig;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// Seam between the speech pipeline and the ASR engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV-encoded audio buffer to plain text.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Transcription`] on engine faults
    /// (launch failure, non-zero exit, overrun, staging failure).
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Transcriber invoking an external whisper-style executable per segment.
pub struct CommandTranscriber {
    program: String,
    model_path: Option<PathBuf>,
    timeout: Duration,
}

impl CommandTranscriber {
    /// Create a transcriber from configuration.
    pub fn new(config: &AsrConfig) -> Self {
        Self {
            program: config.program.clone(),
            model_path: config.model_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        // Stage the audio into a scoped temp file; the TempPath guard
        // removes it on every exit path.
        let staged = tempfile::Builder::new()
            .prefix("aria-asr-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| AssistantError::Transcription(format!("staging temp file: {e}")))?
            .into_temp_path();
        tokio::fs::write(&staged, audio)
            .await
            .map_err(|e| AssistantError::Transcription(format!("staging audio: {e}")))?;

        let mut command = Command::new(&self.program);
        if let Some(model) = &self.model_path {
            command.arg("-m").arg(model);
        }
        command
            .arg("-f")
            .arg(staged.as_os_str())
            .arg("--no-timestamps")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            AssistantError::Transcription(format!("failed to launch {}: {e}", self.program))
        })?;

        // wait_with_output consumes the child; on overrun the drop kills
        // the process via kill_on_drop.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AssistantError::Transcription(format!(
                    "{} exceeded {}s deadline",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AssistantError::Transcription(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssistantError::Transcription(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.chars().take(500).collect::<String>()
            )));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        info!("transcribed {} bytes of audio: \"{transcript}\"", audio.len());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn config_with_program(program: &str) -> AsrConfig {
        AsrConfig {
            program: program.to_owned(),
            model_path: None,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn missing_program_is_transcription_error() {
        let transcriber =
            CommandTranscriber::new(&config_with_program("/nonexistent/aria-asr-engine"));
        let err = transcriber.transcribe(b"RIFFdata").await.unwrap_err();
        assert!(matches!(err, AssistantError::Transcription(_)));
        assert!(err.to_string().contains("failed to launch"));
    }

    #[tokio::test]
    async fn failing_program_is_transcription_error() {
        // `false` exits non-zero without reading the staged file.
        if which::which("false").is_err() {
            return;
        }
        let transcriber = CommandTranscriber::new(&config_with_program("false"));
        let err = transcriber.transcribe(b"RIFFdata").await.unwrap_err();
        assert!(matches!(err, AssistantError::Transcription(_)));
    }

    #[tokio::test]
    async fn echoing_program_yields_stdout() {
        // `cat` with `-f <path> --no-timestamps` would fail; use a shim:
        // the `true` binary exits 0 with empty stdout, which models an
        // engine that heard nothing.
        if which::which("true").is_err() {
            return;
        }
        let transcriber = CommandTranscriber::new(&config_with_program("true"));
        let transcript = transcriber.transcribe(b"RIFFdata").await.unwrap();
        assert!(transcript.is_empty());
    }
}
