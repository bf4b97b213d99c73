use serde::{Deserialize, Serialize};

// ── Scene document fields ────────────────────────────────────────────────

/// Raw text of one scene.
pub const SCENE_TEXT: &str = "scene_text";
/// Bare character names from the name-list backend.
pub const CHARACTERS_MENTIONED: &str = "characters_mentioned";
/// Span-backend characters, same shape as registry entries.
pub const CHARACTERS_PRESENT: &str = "characters_present";

// ── Mention ──────────────────────────────────────────────────────────────

/// One occurrence of a character name inside a scene.
///
/// `start..end` is a half-open character-offset span into the owning
/// scene's text. The scene itself is not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub start: usize,
    pub end: usize,
    /// Surface form matched at this span
    pub text: String,
    /// Short excerpt around the span, for display only
    pub context: String,
}

// ── Character ────────────────────────────────────────────────────────────

/// A resolved character identity and its mention history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Display name, fixed at first observation.
    pub primary_name: String,
    /// Distinct surface forms in discovery order.
    pub aliases: Vec<String>,
    /// Start offset of the first mention ever appended.
    pub first_appearance: usize,
    /// Append-only, in processing order (not necessarily sorted by offset).
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl Character {
    pub fn new(name: &str, first_appearance: usize) -> Self {
        Character {
            primary_name: name.to_string(),
            aliases: vec![name.to_string()],
            first_appearance,
            mentions: Vec::new(),
        }
    }
}

// ── Extraction output ────────────────────────────────────────────────────

/// A person-name span reported by a span-producing extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSpan {
    pub name: String,
    pub start: usize,
    pub end: usize,
}
