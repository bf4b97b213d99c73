//! Extraction backends.
//!
//! Two contracts, kept apart on purpose:
//! - [`SpanExtractor`] reports person names with character offsets and is
//!   the only thing that feeds a [`CharacterRegistry`].
//! - [`NameListExtractor`] reports bare names. Its output is stored next to
//!   the scene, never resolved against offsets.

pub mod llm;
pub mod ner_service;
pub mod pattern;

use std::sync::Arc;

use async_trait::async_trait;
use scene_types::PersonSpan;

use crate::config::Config;
use crate::error::ExtractError;
use crate::registry::CharacterRegistry;

#[async_trait]
pub trait SpanExtractor: Send + Sync {
    /// Short identifier for logs, e.g. "pattern".
    fn backend_id(&self) -> &str;

    /// Person-name spans in `text`, in the order they should be observed.
    async fn extract_spans(&self, text: &str) -> Result<Vec<PersonSpan>, ExtractError>;
}

#[async_trait]
pub trait NameListExtractor: Send + Sync {
    fn backend_id(&self) -> &str;

    /// Character names present in `text`, without positions.
    async fn extract_names(&self, text: &str) -> Result<Vec<String>, ExtractError>;
}

/// The configured span backend: an external NER service if one is set,
/// otherwise the built-in pattern recogniser.
pub fn build_span_extractor(config: &Config) -> Result<Arc<dyn SpanExtractor>, ExtractError> {
    match &config.ner.endpoint {
        Some(endpoint) => Ok(Arc::new(ner_service::NerServiceExtractor::new(endpoint)?)),
        None => Ok(Arc::new(pattern::PatternExtractor::new())),
    }
}

pub fn build_name_extractor(config: &Config) -> Result<Arc<dyn NameListExtractor>, ExtractError> {
    Ok(Arc::new(llm::LlmExtractor::from_config(&config.llm)?))
}

// ── Spans → registry ─────────────────────────────────────────────────────

/// Build a private registry for one scene by observing `spans` in order.
///
/// Spans outside `0 <= start < end <= len(text)` are dropped with a warning.
pub fn scene_registry(text: &str, spans: &[PersonSpan], context_radius: usize) -> CharacterRegistry {
    let chars: Vec<char> = text.chars().collect();
    let mut registry = CharacterRegistry::new();

    for span in spans {
        if span.start >= span.end || span.end > chars.len() {
            tracing::warn!(
                name = %span.name,
                start = span.start,
                end = span.end,
                len = chars.len(),
                "dropping out-of-range span"
            );
            continue;
        }
        let context = context_window(&chars, span.start, span.end, context_radius);
        registry.observe(&span.name, span.start, span.end, &span.name, &context);
    }
    registry
}

/// `radius` characters either side of `start..end`, clamped to the text.
pub fn context_window(chars: &[char], start: usize, end: usize, radius: usize) -> String {
    let from = start.saturating_sub(radius).min(chars.len());
    let to = end.saturating_add(radius).min(chars.len());
    chars[from..to.max(from)].iter().collect()
}

/// Convert a byte offset into `text` to a character offset.
pub(crate) fn char_offset(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_context_window_clamps() {
        let text = chars("Alice met Bob.");
        assert_eq!(context_window(&text, 0, 5, 5), "Alice met ");
        assert_eq!(context_window(&text, 10, 13, 5), " met Bob.");
        assert_eq!(context_window(&text, 10, 13, 0), "Bob");
    }

    #[test]
    fn test_char_offset_multibyte() {
        let text = "Zoë met Bob";
        let byte = text.find("Bob").unwrap();
        assert_eq!(char_offset(text, byte), 8);
    }

    #[test]
    fn test_scene_registry_drops_bad_spans() {
        let text = "Alice met Bob.";
        let spans = vec![
            PersonSpan { name: "Alice".into(), start: 0, end: 5 },
            PersonSpan { name: "Ghost".into(), start: 12, end: 40 },
            PersonSpan { name: "Empty".into(), start: 3, end: 3 },
            PersonSpan { name: "Bob".into(), start: 10, end: 13 },
        ];
        let reg = scene_registry(text, &spans, 2);
        let names = reg.list_characters(usize::MAX);
        assert_eq!(names, vec!["Alice", "Bob"]);
        let bob = reg.characters().get("bob").unwrap();
        assert_eq!(bob.mentions[0].context, "t Bob.");
    }

    #[test]
    fn test_build_span_extractor_defaults_to_pattern() {
        let extractor = build_span_extractor(&Config::default()).unwrap();
        assert_eq!(extractor.backend_id(), "pattern");
    }
}
