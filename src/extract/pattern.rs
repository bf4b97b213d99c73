use async_trait::async_trait;
use regex::Regex;
use scene_types::PersonSpan;

use super::{char_offset, SpanExtractor};
use crate::error::ExtractError;

/// Titles that may open a name, as in "Mr. Darcy" or "Queen Alice".
pub const HONORIFICS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Miss", "Dr", "Sir", "Lady", "Lord", "Madam", "Madame", "Master", "Mistress",
    "King", "Queen", "Prince", "Princess", "Duke", "Duchess", "Count", "Countess", "Captain",
    "Professor", "Father", "Mother", "Aunt", "Uncle",
];

// ── False positive filtering ─────────────────────────────────────────────

/// Capitalised words that are almost never names on their own: sentence
/// openers, pronouns, function words, calendar words, interjections.
const BLACKLIST: &[&str] = &[
    // Pronouns and determiners
    "I", "He", "She", "It", "We", "They", "You", "His", "Her", "Its", "Our", "Their", "Your", "My",
    "Me", "Him", "Them", "Us", "This", "That", "These", "Those", "The", "A", "An", "Some", "Any",
    "Each", "Every", "No", "None", "All", "Both",
    // Conjunctions / prepositions / adverbs that open sentences
    "And", "But", "Or", "Nor", "So", "Yet", "For", "If", "When", "While", "Then", "Now", "There",
    "Here", "What", "Who", "Why", "How", "Where", "Which", "After", "Before", "As", "At", "By",
    "In", "On", "Of", "To", "With", "Without", "From", "Into", "Upon", "Once", "Still", "Just",
    "Not", "Yes", "Perhaps", "Suddenly", "However", "Well", "Even", "Only", "Soon", "Again",
    // Interjections
    "Oh", "Ah", "Alas", "Hush", "Hello", "Goodbye",
    // Calendar
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "January",
    "February", "March", "April", "June", "July", "August", "September", "October", "November",
    "December",
    // Book furniture
    "Chapter", "CHAPTER", "Book", "Part", "Volume", "End",
];

fn is_blacklisted(word: &str) -> bool {
    BLACKLIST.contains(&word)
}

/// Build a regex fragment matching any honorific, longest first.
fn build_honorific_regex() -> String {
    let mut all: Vec<&str> = HONORIFICS.to_vec();
    all.sort_by_key(|h| std::cmp::Reverse(h.len()));
    format!("(?:{})", all.join("|"))
}

// ── Recogniser ───────────────────────────────────────────────────────────

/// Built-in person-name recogniser. No model, no network.
///
/// Finds runs of capitalised words, optionally led by an honorific, then
/// strips leading blacklisted words ("The Hatter" → "Hatter").
pub struct PatternExtractor {
    re_name: Regex,
}

impl PatternExtractor {
    pub fn new() -> Self {
        let honorific = build_honorific_regex();
        let word = r"\p{Lu}\p{Ll}+(?:-\p{Lu}?\p{Ll}+)*";
        // Spaces, or one line wrap; a blank line ends the name.
        let sep = r"(?:[ \t]*\r?\n[ \t]*|[ \t]+)";
        let unit = format!(r"(?:{honorific}\.?{sep})?{word}");
        let re_name = Regex::new(&format!(r"\b{unit}(?:{sep}{unit})*")).expect("name regex");
        PatternExtractor { re_name }
    }

    /// Spans in character offsets, in text order.
    ///
    /// Names are reported with internal whitespace collapsed to single
    /// spaces, so a name wrapped across lines keeps one identity. Offsets
    /// still cover the text as written.
    pub fn scan_text(&self, text: &str) -> Vec<PersonSpan> {
        let mut spans = Vec::new();

        for m in self.re_name.find_iter(text) {
            // Drop leading words until the run starts with something name-like.
            let mut start = m.start();
            let mut rest = m.as_str();
            while let Some((head, tail)) = rest.split_once(char::is_whitespace) {
                if !is_blacklisted(head.trim_end_matches('.')) {
                    break;
                }
                let tail = tail.trim_start();
                start += rest.len() - tail.len();
                rest = tail;
            }
            if is_blacklisted(rest) {
                continue;
            }
            // A lone honorific ("Queen", "Mr") names nobody in particular.
            if HONORIFICS.contains(&rest.trim_end_matches('.')) {
                continue;
            }

            let end = start + rest.len();
            spans.push(PersonSpan {
                name: rest.split_whitespace().collect::<Vec<_>>().join(" "),
                start: char_offset(text, start),
                end: char_offset(text, end),
            });
        }

        spans
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpanExtractor for PatternExtractor {
    fn backend_id(&self) -> &str {
        "pattern"
    }

    async fn extract_spans(&self, text: &str) -> Result<Vec<PersonSpan>, ExtractError> {
        Ok(self.scan_text(text))
    }
}
