//! Error types for the assistant pipeline.

/// Top-level error type for the conversational assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The submitted turn contained no usable input.
    ///
    /// This is a no-op condition: nothing is recorded into history.
    #[error("empty user input")]
    UserInputEmpty,

    /// The model runtime did not answer within the configured deadline.
    ///
    /// Retryable; callers report it distinctly but do not auto-retry.
    #[error("model request timed out after {0}s")]
    ModelTimeout(u64),

    /// The model runtime is unreachable (connection refused, DNS failure).
    #[error("model runtime unreachable: {0}")]
    ModelUnreachable(String),

    /// The model runtime answered with a non-success status or a body that
    /// could not be decoded.
    #[error("model protocol error: {0}")]
    ModelProtocolError(String),

    /// Speech transcription failed (ASR engine fault).
    #[error("transcription error: {0}")]
    Transcription(String),

    /// A synthesis stage failed.
    ///
    /// Never escapes the speech pipeline: synthesis degrades through the
    /// fallback chain down to a silent buffer.
    #[error("speech engine unavailable: {0}")]
    SpeechEngineUnavailable(String),

    /// An explicit mode-switch request named something other than
    /// `voice` or `chat`.
    #[error("invalid mode request: {0}")]
    InvalidModeRequest(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistantError {
    /// Returns `true` for conditions a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelTimeout(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable() {
        assert!(AssistantError::ModelTimeout(60).is_retryable());
        assert!(!AssistantError::ModelUnreachable("refused".into()).is_retryable());
        assert!(!AssistantError::UserInputEmpty.is_retryable());
    }

    #[test]
    fn display_includes_detail() {
        let err = AssistantError::ModelProtocolError("HTTP 500".into());
        assert!(err.to_string().contains("HTTP 500"));

        let err = AssistantError::ModelTimeout(60);
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AssistantError = io.into();
        assert!(matches!(err, AssistantError::Io(_)));
    }
}
