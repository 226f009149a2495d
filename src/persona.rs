//! Persona filtering for model output and canned responses.
//!
//! Raw model text passes through [`PersonaFilter::filter`], which
//! occasionally adds a conversational flourish and always normalizes
//! formatting. The filter also owns the canned response pools (welcome,
//! error, thinking) and the scripted capability-query answers.
//!
//! Flourish selection is driven by an injected seedable RNG so tests can
//! pin the rolls; see [`PersonaFilter::with_seed`].

use chrono::{DateTime, Local, Timelike};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// System prompt defining the assistant's character, pinned first in
/// every prompt context.
pub const SYSTEM_PROMPT: &str = "\
You are ARIA, a sophisticated AI assistant with wit and personality. You should be:

- Helpful and knowledgeable, providing accurate and useful information
- Witty and engaging, with a touch of British humor when appropriate
- Professional yet personable, like a capable butler or assistant
- Concise but thorough - don't ramble, but provide complete answers
- Slightly sarcastic occasionally, but never rude or dismissive
- Always respectful and supportive of the user

You have access to various capabilities that will be added over time:
- Calendar management (coming soon)
- Document analysis (coming soon)
- Web search (coming soon)
- Task management (coming soon)

For now, focus on being a helpful conversational assistant. If asked about capabilities you don't have yet, acknowledge it with wit but offer to help in other ways.

Keep responses conversational and engaging. Avoid overly formal language unless the situation calls for it.";

/// Canned greetings served to newly connected clients.
pub const WELCOME_MESSAGES: &[&str] = &[
    "Good day! ARIA at your service. How may I assist you today?",
    "Hello there! Your personal AI assistant is ready and eager to help.",
    "Greetings! ARIA online and operational. What can I do for you?",
    "Welcome back! I trust you're having a productive day. How can I help?",
    "At your service! What pressing matters shall we tackle today?",
];

/// In-voice error messages substituted for empty model output and used
/// as the base of flavored gateway-failure replies.
pub const ERROR_MESSAGES: &[&str] = &[
    "I apologize, but I seem to have encountered a slight technical difficulty. Shall we try that again?",
    "My circuits are feeling a bit scrambled at the moment. Could you repeat your request?",
    "I'm afraid something went awry on my end. Perhaps we could approach this differently?",
    "It appears I've hit a minor snag. Let me gather my wits and we'll try once more.",
    "Technical difficulties, I'm afraid. Even AI assistants have their off moments!",
];

/// Filler lines a client may show while a turn is in flight.
pub const THINKING_MESSAGES: &[&str] = &[
    "Let me ponder that for a moment...",
    "Processing your request...",
    "Analyzing the situation...",
    "Consulting my vast knowledge base...",
    "One moment while I consider this...",
];

const START_FLOURISHES: &[&str] = &[
    "I must say, ",
    "Indeed, ",
    "Quite right, ",
    "Certainly, ",
    "Absolutely, ",
];

const END_FLOURISHES: &[&str] = &[
    " I do hope that helps!",
    " Anything else you'd like to know?",
    " Will that suffice?",
    " I trust that's useful?",
    " Does that answer your question?",
];

/// Outer gate: fraction of calls that receive any flourish at all.
const P_ENHANCE: f64 = 0.3;
/// Within the gate: probability of a start flourish.
const P_START: f64 = 0.4;
/// Within the gate: probability of an end flourish.
const P_END: f64 = 0.3;
/// Minimum text length for an end flourish.
const END_FLOURISH_MIN_LEN: usize = 50;

const GREETING_WORDS: &[&str] = &["hello", "hi", "good", "greetings"];

/// Keywords that trigger the time-context prefix in [`PersonaFilter::enhance_prompt`].
const TIME_KEYWORDS: &[&str] = &[
    "today", "now", "current", "time", "date", "schedule", "calendar",
];

// Capability topic keyword sets, checked in priority order.
const SPEECH_KEYWORDS: &[&str] = &["speak", "voice", "audio", "speech"];
const CALENDAR_KEYWORDS: &[&str] = &["calendar", "schedule", "appointment"];
const SEARCH_KEYWORDS: &[&str] = &["search", "google", "web", "internet"];
const DOCUMENT_KEYWORDS: &[&str] = &["document", "pdf", "file", "analyze"];

/// Feature → status pairs backing the generic capability summary.
const CAPABILITY_STATUS: &[(&str, &str)] = &[
    ("speech_to_text", "Coming soon - Phase 2"),
    ("text_to_speech", "Coming soon - Phase 2"),
    ("calendar_integration", "Coming soon - Phase 3"),
    ("document_analysis", "Coming soon - Phase 4"),
    ("web_search", "Coming soon - Phase 5"),
    ("basic_conversation", "Active"),
    ("personality", "Active"),
];

/// Applies persona styling to raw model output and serves the canned
/// response pools.
pub struct PersonaFilter {
    rng: Mutex<StdRng>,
}

impl PersonaFilter {
    /// Create a filter with entropy-seeded randomness.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a filter with a fixed seed for deterministic flourish rolls.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick a welcome message.
    pub fn welcome_message(&self) -> String {
        self.choose(WELCOME_MESSAGES)
    }

    /// Pick an error message.
    pub fn error_message(&self) -> String {
        self.choose(ERROR_MESSAGES)
    }

    /// Pick a thinking/processing message.
    pub fn thinking_message(&self) -> String {
        self.choose(THINKING_MESSAGES)
    }

    /// Filter raw model output into persona-styled text.
    ///
    /// Empty or whitespace-only input is replaced by a canned error
    /// message. Otherwise the text is occasionally flourished (outer
    /// gate 30%, then independent start/end rolls) and always passed
    /// through [`clean_formatting`].
    pub fn filter(&self, raw: &str) -> String {
        let text = raw.trim();
        if text.is_empty() {
            return self.error_message();
        }

        let mut out = text.to_owned();
        {
            let mut rng = self.lock_rng();
            if rng.gen_range(0.0..1.0) < P_ENHANCE {
                if rng.gen_range(0.0..1.0) < P_START && !starts_with_greeting(text) {
                    let flourish = START_FLOURISHES
                        .choose(&mut *rng)
                        .copied()
                        .unwrap_or_default();
                    out = capitalize_first(&format!("{flourish}{}", lowercase_first(&out)));
                }
                if rng.gen_range(0.0..1.0) < P_END
                    && !text.ends_with('?')
                    && text.chars().count() > END_FLOURISH_MIN_LEN
                {
                    let flourish = END_FLOURISHES
                        .choose(&mut *rng)
                        .copied()
                        .unwrap_or_default();
                    out.push_str(flourish);
                }
            }
        }

        clean_formatting(&out)
    }

    /// Prefix time-sensitive queries with a generated time-context
    /// sentence; all other input is returned unchanged.
    pub fn enhance_prompt(&self, user_text: &str) -> String {
        self.enhance_prompt_at(user_text, Local::now())
    }

    fn enhance_prompt_at(&self, user_text: &str, now: DateTime<Local>) -> String {
        let lower = user_text.to_lowercase();
        if TIME_KEYWORDS.iter().any(|k| lower.contains(k)) {
            format!(
                "Current time context: {}\n\nUser query: {user_text}",
                time_context(now)
            )
        } else {
            user_text.to_owned()
        }
    }

    /// Answer a capability question with a fixed scripted response.
    ///
    /// Topics are checked in priority order (speech, calendar, search,
    /// documents); the first match wins. An unmatched query gets the
    /// generic capability summary — once invoked, this always answers.
    /// Whether to invoke it at all is the caller's keyword gate
    /// ([`is_capability_query`]).
    pub fn handle_capability_query(&self, query: &str) -> String {
        let lower = query.to_lowercase();

        if SPEECH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return "I'm afraid I haven't quite mastered the art of speech yet - that's coming in Phase 2! For now, I'm quite content with our text-based conversations.".to_owned();
        }
        if CALENDAR_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return "Calendar integration is on my to-do list for Phase 3. Until then, I'm happy to help you think through scheduling matters the old-fashioned way!".to_owned();
        }
        if SEARCH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return "Web search capabilities are planned for Phase 5. For now, I'll have to rely on my existing knowledge base - though I like to think it's rather comprehensive!".to_owned();
        }
        if DOCUMENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return "Document analysis is scheduled for Phase 4. Currently, I can't peek at your files, but I'm happy to discuss their contents if you'd like to share excerpts!".to_owned();
        }

        let active: Vec<&str> = CAPABILITY_STATUS
            .iter()
            .filter(|(_, status)| *status == "Active")
            .map(|(name, _)| *name)
            .collect();
        let coming: Vec<&str> = CAPABILITY_STATUS
            .iter()
            .filter(|(_, status)| status.starts_with("Coming soon"))
            .map(|(name, _)| *name)
            .collect();
        format!(
            "Currently, I'm equipped with {}. Coming soon: {}. I'm growing more capable by the day!",
            active.join(", "),
            coming.join(", ")
        )
    }

    fn choose(&self, pool: &[&str]) -> String {
        let mut rng = self.lock_rng();
        pool.choose(&mut *rng).copied().unwrap_or_default().to_owned()
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PersonaFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-side gate deciding whether a message plausibly asks about
/// capabilities and should be answered from script instead of the model.
pub fn is_capability_query(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.contains("what can you do") || lower.contains("capabilities") {
        return true;
    }
    let asks = lower.contains("can you")
        || lower.contains("are you able")
        || lower.contains("do you support");
    asks
        && SPEECH_KEYWORDS
            .iter()
            .chain(CALENDAR_KEYWORDS)
            .chain(SEARCH_KEYWORDS)
            .chain(DOCUMENT_KEYWORDS)
            .any(|k| lower.contains(k))
}

/// Normalize capitalization, terminal punctuation, and whitespace.
///
/// - first character upper-cased
/// - `.` appended unless the text already ends in `.`, `!`, `?`, or `:`
/// - whitespace runs collapsed to a single space
/// - whitespace removed immediately before sentence punctuation
/// - exactly one space after sentence punctuation followed by a
///   lowercase letter
pub fn clean_formatting(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = capitalize_first(text);
    if !matches!(s.chars().last(), Some('.' | '!' | '?' | ':')) {
        s.push('.');
    }

    let mut collapsed = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                collapsed.push(' ');
            }
            prev_space = true;
        } else {
            if matches!(ch, '.' | '!' | '?') {
                while collapsed.ends_with(' ') {
                    collapsed.pop();
                }
            }
            collapsed.push(ch);
            prev_space = false;
        }
    }

    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(collapsed.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        out.push(chars[i]);
        if matches!(chars[i], '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j < chars.len() && chars[j].is_lowercase() {
                out.push(' ');
                i = j;
                continue;
            }
        }
        i += 1;
    }

    out.trim().to_owned()
}

fn starts_with_greeting(text: &str) -> bool {
    let lower = text.to_lowercase();
    GREETING_WORDS.iter().any(|g| lower.starts_with(g))
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Render the time-context sentence used by `enhance_prompt`.
fn time_context(now: DateTime<Local>) -> String {
    let day_part = match now.hour() {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    };
    format!(
        "It's currently {} on {} ({day_part})",
        now.format("%I:%M %p"),
        now.format("%A, %B %d, %Y")
    )
}
