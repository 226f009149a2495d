//! Synthesizer implementations and the startup probe.
//!
//! Text-to-speech is an ordered fallback chain behind one capability
//! interface: the primary engine discovered by [`probe_candidates`], then
//! the system `espeak` fallback, then [`SilenceSynthesizer`], which always
//! succeeds. Each subprocess stage writes to a scoped temp WAV and is
//! awaited with a bounded grace period; overruns are killed before the
//! chain falls through.

use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// One stage of the synthesis chain.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Stage name for logging.
    fn name(&self) -> &str;

    /// Render `text` to a WAV byte buffer.
    ///
    /// # Errors
    ///
    /// A failed stage (spawn failure, non-zero exit, missing or empty
    /// output artifact, overrun) returns
    /// [`AssistantError::SpeechEngineUnavailable`]; the pipeline falls
    /// through to the next stage rather than propagating.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// Primary engine discovered at startup, driven over the
/// `--text/--output/--voice` CLI contract.
pub struct CommandSynthesizer {
    name: String,
    program: PathBuf,
    timeout: Duration,
}

impl CommandSynthesizer {
    /// Wrap a probed executable.
    pub fn new(name: impl Into<String>, program: PathBuf, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            program,
            timeout,
        }
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let output = scratch_wav_path(&self.name)?;

        let mut command = Command::new(&self.program);
        command
            .arg("--text")
            .arg(text)
            .arg("--output")
            .arg(&output)
            .arg("--voice")
            .arg(voice);
        run_engine(command, &self.name, self.timeout).await?;

        read_artifact(&output, &self.name).await
    }
}

/// System-level fallback driven through `espeak`.
pub struct EspeakSynthesizer {
    timeout: Duration,
}

impl EspeakSynthesizer {
    /// Create the espeak fallback stage.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    fn name(&self) -> &str {
        "espeak"
    }

    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
        let output = scratch_wav_path("espeak")?;

        let mut command = Command::new("espeak");
        command
            .arg("-w")
            .arg(&output)
            .args(["-s", "150", "-a", "100"])
            .arg(text);
        run_engine(command, "espeak", self.timeout).await?;

        read_artifact(&output, "espeak").await
    }
}

/// Terminal stage: renders a silent WAV buffer and never fails.
pub struct SilenceSynthesizer {
    sample_rate: u32,
}

impl SilenceSynthesizer {
    /// Create a silence generator at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Render `duration_secs` of 16-bit mono silence as WAV bytes.
    pub fn render(&self, duration_secs: f32) -> Vec<u8> {
        let samples = (duration_secs.max(0.0) * self.sample_rate as f32) as usize;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = match hound::WavWriter::new(&mut cursor, spec) {
                Ok(writer) => writer,
                Err(_) => return Vec::new(),
            };
            for _ in 0..samples {
                if writer.write_sample(0i16).is_err() {
                    return Vec::new();
                }
            }
            if writer.finalize().is_err() {
                return Vec::new();
            }
        }
        cursor.into_inner()
    }
}

#[async_trait]
impl Synthesizer for SilenceSynthesizer {
    fn name(&self) -> &str {
        "silence"
    }

    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
        Ok(self.render(0.1 * text.chars().count() as f32))
    }
}

/// Probe candidate executables in order; the first one that answers a
/// `--help` probe within the timeout becomes the primary engine.
pub async fn probe_candidates(
    candidates: &[String],
    timeout: Duration,
) -> Option<CommandSynthesizer> {
    for candidate in candidates {
        let Ok(program) = which::which(candidate) else {
            debug!(candidate = candidate.as_str(), "TTS candidate not on PATH");
            continue;
        };

        let mut command = Command::new(&program);
        command.arg("--help");
        match run_engine(command, candidate, timeout).await {
            Ok(()) => {
                info!(
                    engine = candidate.as_str(),
                    path = %program.display(),
                    "TTS engine discovered"
                );
                return Some(CommandSynthesizer::new(candidate.as_str(), program, timeout));
            }
            Err(e) => {
                debug!(candidate = candidate.as_str(), "TTS probe failed: {e}");
            }
        }
    }
    None
}

/// Reserve a temp `.wav` path scoped to the calling operation.
///
/// The path is owned by a `TempPath`, so the file is removed when the
/// returned guard drops — on success, error, and cancellation alike.
fn scratch_wav_path(stage: &str) -> Result<ScratchWav> {
    let file = tempfile::Builder::new()
        .prefix("aria-tts-")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| {
            AssistantError::SpeechEngineUnavailable(format!("{stage}: temp file: {e}"))
        })?;
    Ok(ScratchWav {
        path: file.into_temp_path(),
    })
}

/// Scoped output artifact; deletes the backing file on drop.
struct ScratchWav {
    path: tempfile::TempPath,
}

impl AsRef<std::ffi::OsStr> for ScratchWav {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.path.as_os_str()
    }
}

/// Spawn an engine process and await it with a bounded grace period,
/// killing it on overrun.
async fn run_engine(mut command: Command, name: &str, grace: Duration) -> Result<()> {
    command
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        AssistantError::SpeechEngineUnavailable(format!("{name}: failed to launch: {e}"))
    })?;

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(AssistantError::SpeechEngineUnavailable(format!(
            "{name}: exited with {status}"
        ))),
        Ok(Err(e)) => Err(AssistantError::SpeechEngineUnavailable(format!(
            "{name}: wait failed: {e}"
        ))),
        Err(_) => {
            let _ = child.kill().await;
            Err(AssistantError::SpeechEngineUnavailable(format!(
                "{name}: killed after exceeding {}s grace period",
                grace.as_secs()
            )))
        }
    }
}

/// Read the engine's output artifact, rejecting missing or empty files.
async fn read_artifact(path: &ScratchWav, name: &str) -> Result<Vec<u8>> {
    let audio = tokio::fs::read(&path.path).await.map_err(|e| {
        AssistantError::SpeechEngineUnavailable(format!("{name}: no output artifact: {e}"))
    })?;
    if audio.is_empty() {
        return Err(AssistantError::SpeechEngineUnavailable(format!(
            "{name}: produced an empty output artifact"
        )));
    }
    Ok(audio)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn silence_render_length_scales_with_duration() {
        let silence = SilenceSynthesizer::new(16_000);
        let one_sec = silence.render(1.0);
        let two_sec = silence.render(2.0);
        assert!(!one_sec.is_empty());
        assert!(two_sec.len() > one_sec.len());
        // 1s of 16-bit mono at 16kHz is 32000 data bytes plus the header.
        assert!(one_sec.len() >= 32_000);
        assert!(one_sec.len() < 33_000);
    }

    #[test]
    fn silence_render_is_valid_wav() {
        let silence = SilenceSynthesizer::new(16_000);
        let bytes = silence.render(0.5);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn silence_render_zero_duration() {
        let silence = SilenceSynthesizer::new(16_000);
        let bytes = silence.render(0.0);
        // Header only, no samples.
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[tokio::test]
    async fn silence_trait_duration_scales_with_text() {
        let silence = SilenceSynthesizer::new(16_000);
        let short = silence.synthesize("hi", "default").await.unwrap();
        let long = silence
            .synthesize("a considerably longer sentence", "default")
            .await
            .unwrap();
        assert!(long.len() > short.len());
    }

    #[tokio::test]
    async fn probe_skips_missing_candidates() {
        let candidates = vec!["aria-test-no-such-engine-xyz".to_owned()];
        let result = probe_candidates(&candidates, Duration::from_secs(1)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn command_synthesizer_missing_binary_errors() {
        let synth = CommandSynthesizer::new(
            "ghost",
            PathBuf::from("/nonexistent/aria-ghost-engine"),
            Duration::from_secs(1),
        );
        let err = synth.synthesize("hello", "default").await.unwrap_err();
        assert!(matches!(err, AssistantError::SpeechEngineUnavailable(_)));
    }

    #[tokio::test]
    async fn hung_engine_is_killed_within_grace() {
        let Ok(sleep_path) = which::which("sleep") else {
            return;
        };
        let mut command = Command::new(sleep_path);
        command.arg("30");
        let started = std::time::Instant::now();
        let err = run_engine(command, "sleepy", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::SpeechEngineUnavailable(_)));
        assert!(err.to_string().contains("grace period"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn scratch_wav_is_deleted_on_drop() {
        let scratch = scratch_wav_path("test").unwrap();
        let path = scratch.path.to_path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }
}
