//! Voice/chat interaction mode state machine.
//!
//! The session is always in exactly one of two modes. Explicit switches
//! come from the API surface; implicit switches are detected from spoken
//! or typed messages and applied as a side effect of processing them.
//! The machine has no timeouts and never reverts on its own.

use crate::error::AssistantError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scripted acknowledgement for a switch into chat mode.
pub const MSG_SWITCHED_TO_CHAT: &str =
    "Switching to chat mode. You can now type your messages.";
/// Scripted acknowledgement for a switch into voice mode.
pub const MSG_SWITCHED_TO_VOICE: &str = "Switching to voice mode.";
/// Informational reply for a voice switch while already in voice mode.
pub const MSG_VOICE_ALREADY_ACTIVE: &str = "Voice mode is already active.";

/// Session interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Spoken turns in, synthesized audio out.
    Voice,
    /// Typed turns in, text out.
    Chat,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voice => write!(f, "voice"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "voice" => Ok(Self::Voice),
            "chat" => Ok(Self::Chat),
            other => Err(AssistantError::InvalidModeRequest(other.to_owned())),
        }
    }
}

/// Outcome of applying a detected or requested switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The mode changed to the target.
    Switched(SessionMode),
    /// The target was already active.
    AlreadyActive(SessionMode),
}

/// Tracks the current mode and applies switches.
#[derive(Debug)]
pub struct ModeMachine {
    mode: SessionMode,
}

impl ModeMachine {
    /// Create a machine starting in the given mode.
    pub fn new(initial: SessionMode) -> Self {
        Self { mode: initial }
    }

    /// The current mode.
    pub fn current(&self) -> SessionMode {
        self.mode
    }

    /// Apply an explicit API-requested switch. Validation of the raw
    /// request happens at the edge ([`SessionMode::from_str`]); by the
    /// time a value reaches here it is legal.
    pub fn request_switch(&mut self, target: SessionMode) -> SwitchOutcome {
        if self.mode == target {
            SwitchOutcome::AlreadyActive(target)
        } else {
            self.mode = target;
            SwitchOutcome::Switched(target)
        }
    }

    /// Apply a switch detected from a message and return the scripted
    /// reply for it.
    ///
    /// A chat switch re-acknowledges even when chat is already active
    /// (the state change is a no-op); a voice switch while voice is
    /// active answers "already active" instead of the normal turn.
    pub fn acknowledge_detected(&mut self, target: SessionMode) -> &'static str {
        let reply = detected_ack(self.mode, target);
        self.mode = target;
        reply
    }
}

/// Scripted reply for a detected switch, given the mode it was detected
/// in. Pure; the state change itself is applied by [`ModeMachine`].
pub fn detected_ack(current: SessionMode, target: SessionMode) -> &'static str {
    match (current, target) {
        (SessionMode::Voice, SessionMode::Voice) => MSG_VOICE_ALREADY_ACTIVE,
        (_, SessionMode::Chat) => MSG_SWITCHED_TO_CHAT,
        (SessionMode::Chat, SessionMode::Voice) => MSG_SWITCHED_TO_VOICE,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn parse_legal_values() {
        assert_eq!("voice".parse::<SessionMode>().unwrap(), SessionMode::Voice);
        assert_eq!("Chat".parse::<SessionMode>().unwrap(), SessionMode::Chat);
        assert_eq!(" VOICE ".parse::<SessionMode>().unwrap(), SessionMode::Voice);
    }

    #[test]
    fn parse_rejects_everything_else() {
        let err = "video".parse::<SessionMode>().unwrap_err();
        assert!(matches!(err, AssistantError::InvalidModeRequest(_)));
        assert!("".parse::<SessionMode>().is_err());
    }

    #[test]
    fn explicit_switch_changes_mode() {
        let mut machine = ModeMachine::new(SessionMode::Voice);
        assert_eq!(
            machine.request_switch(SessionMode::Chat),
            SwitchOutcome::Switched(SessionMode::Chat)
        );
        assert_eq!(machine.current(), SessionMode::Chat);
        assert_eq!(
            machine.request_switch(SessionMode::Chat),
            SwitchOutcome::AlreadyActive(SessionMode::Chat)
        );
    }

    #[test]
    fn detected_chat_switch_from_voice() {
        let mut machine = ModeMachine::new(SessionMode::Voice);
        let reply = machine.acknowledge_detected(SessionMode::Chat);
        assert_eq!(reply, MSG_SWITCHED_TO_CHAT);
        assert_eq!(machine.current(), SessionMode::Chat);
    }

    #[test]
    fn detected_chat_switch_while_in_chat_is_noop() {
        let mut machine = ModeMachine::new(SessionMode::Chat);
        let reply = machine.acknowledge_detected(SessionMode::Chat);
        assert_eq!(reply, MSG_SWITCHED_TO_CHAT);
        assert_eq!(machine.current(), SessionMode::Chat);
    }

    #[test]
    fn detected_voice_switch_while_in_voice_reports_already_active() {
        let mut machine = ModeMachine::new(SessionMode::Voice);
        let reply = machine.acknowledge_detected(SessionMode::Voice);
        assert_eq!(reply, MSG_VOICE_ALREADY_ACTIVE);
        assert_eq!(machine.current(), SessionMode::Voice);
    }

    #[test]
    fn detected_voice_switch_from_chat() {
        let mut machine = ModeMachine::new(SessionMode::Chat);
        let reply = machine.acknowledge_detected(SessionMode::Voice);
        assert_eq!(reply, MSG_SWITCHED_TO_VOICE);
        assert_eq!(machine.current(), SessionMode::Voice);
    }

    #[test]
    fn mode_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&SessionMode::Voice).unwrap(), "\"voice\"");
        let parsed: SessionMode = serde_json::from_str("\"chat\"").unwrap();
        assert_eq!(parsed, SessionMode::Chat);
    }
}
