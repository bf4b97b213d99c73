use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use scene_types::{Character, Mention};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RegistryError;

/// Normalize a surface form into the key that decides identity.
///
/// Purely lexical: lower-case, spaces become underscores. "Dr. Smith" and
/// "Smith" stay distinct; "Alice" and "alice" collide.
pub fn identity_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

// ── Insertion-ordered character map ──────────────────────────────────────

/// Identity key → Character, iterated in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterMap(IndexMap<String, Character>);

impl CharacterMap {
    pub fn get(&self, key: &str) -> Option<&Character> {
        self.0.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Character> {
        self.0.get_mut(key)
    }

    /// Insert or replace. A replaced key keeps its original position.
    fn insert(&mut self, key: String, character: Character) {
        self.0.insert(key, character);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Character)> {
        self.0.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn values(&self) -> impl Iterator<Item = &Character> {
        self.0.values()
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Every character seen so far, keyed by identity, plus book-level metadata.
///
/// Not synchronized: concurrent producers either own a private registry
/// and [`merge`](Self::merge) afterwards, or funnel through one owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterRegistry {
    #[serde(rename = "book_metadata", default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    characters: CharacterMap,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn characters(&self) -> &CharacterMap {
        &self.characters
    }

    /// Record one mention of `name`, creating its identity on first sight.
    pub fn observe(&mut self, name: &str, start: usize, end: usize, text: &str, context: &str) {
        let key = identity_key(name);
        if self.characters.get(&key).is_none() {
            tracing::debug!(name, key = %key, start, "new character");
            self.characters.insert(key.clone(), Character::new(name, start));
        }

        let mention = Mention {
            start,
            end,
            text: text.to_string(),
            context: context.to_string(),
        };
        if let Some(character) = self.characters.get_mut(&key) {
            character.mentions.push(mention);
        }
    }

    /// What the reader knows about `name` at `position`.
    ///
    /// Matches `primary_name` case-insensitively (not aliases, not keys).
    /// The first match in insertion order wins. Mentions are filtered to
    /// `start <= position` in an owned copy.
    pub fn character_at_position(&self, name: &str, position: usize) -> Option<Character> {
        let wanted = name.to_lowercase();
        let found = self
            .characters
            .values()
            .find(|c| c.primary_name.to_lowercase() == wanted)?;

        Some(Character {
            primary_name: found.primary_name.clone(),
            aliases: found.aliases.clone(),
            first_appearance: found.first_appearance,
            mentions: found
                .mentions
                .iter()
                .filter(|m| m.start <= position)
                .cloned()
                .collect(),
        })
    }

    /// Primary names of characters whose first appearance is at or before `position`.
    pub fn list_characters(&self, position: usize) -> Vec<&str> {
        self.characters
            .values()
            .filter(|c| c.first_appearance <= position)
            .map(|c| c.primary_name.as_str())
            .collect()
    }

    /// Fold `other` in as if its observations happened after ours.
    ///
    /// New identities arrive whole; known identities only gain mentions.
    pub fn merge(&mut self, other: CharacterRegistry) {
        for (key, incoming) in other.characters.0 {
            match self.characters.get_mut(&key) {
                Some(existing) => existing.mentions.extend(incoming.mentions),
                None => self.characters.insert(key, incoming),
            }
        }
        for (k, v) in other.metadata {
            self.metadata.entry(k).or_insert(v);
        }
    }

    // ── Persistence ──────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, RegistryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the whole registry, replacing whatever was at `path`.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let json = self.to_json()?;
        fs::write(path, &json).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), characters = self.characters.len(), "saved registry");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = "Alice met Bob. Bob smiled at Alice.";

    fn scenario() -> CharacterRegistry {
        let mut reg = CharacterRegistry::new();
        for (name, start, end) in [("Alice", 0, 5), ("Bob", 10, 13), ("Bob", 15, 18), ("Alice", 29, 34)] {
            reg.observe(name, start, end, name, &SCENE[start..end]);
        }
        reg
    }

    #[test]
    fn test_identity_key() {
        assert_eq!(identity_key("Mad Hatter"), "mad_hatter");
        assert_eq!(identity_key("ALICE"), "alice");
        assert_eq!(identity_key(" Alice"), "_alice");
        assert_ne!(identity_key("Dr. Smith"), identity_key("Smith"));
    }

    #[test]
    fn test_scene_scenario() {
        let reg = scenario();
        let keys: Vec<&str> = reg.characters().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alice", "bob"]);

        let alice = reg.characters().get("alice").unwrap();
        let bob = reg.characters().get("bob").unwrap();
        assert_eq!(alice.first_appearance, 0);
        assert_eq!(bob.first_appearance, 10);
        assert_eq!(alice.mentions.len(), 2);
        assert_eq!(bob.mentions.len(), 2);
        assert_eq!(alice.aliases, vec!["Alice".to_string()]);
    }

    #[test]
    fn test_same_name_merges() {
        let mut reg = CharacterRegistry::new();
        reg.observe("Alice", 0, 5, "Alice", "");
        reg.observe("Alice", 50, 55, "Alice", "");
        assert_eq!(reg.characters().len(), 1);
        let alice = reg.characters().get("alice").unwrap();
        assert_eq!(alice.mentions.len(), 2);
        assert_eq!(alice.first_appearance, 0);
    }

    #[test]
    fn test_first_appearance_not_rederived() {
        let mut reg = CharacterRegistry::new();
        reg.observe("Alice", 40, 45, "Alice", "");
        reg.observe("Alice", 3, 8, "Alice", "");
        assert_eq!(reg.characters().get("alice").unwrap().first_appearance, 40);
    }

    #[test]
    fn test_case_variants_share_identity() {
        let mut reg = CharacterRegistry::new();
        reg.observe("alice", 0, 5, "alice", "");
        reg.observe("Alice", 10, 15, "Alice", "");
        assert_eq!(reg.characters().len(), 1);
        assert_eq!(reg.characters().get("alice").unwrap().primary_name, "alice");

        let found = reg.character_at_position("Alice", 100).unwrap();
        assert_eq!(found.mentions.len(), 2);
        assert!(reg.character_at_position("ALICE", 100).is_some());
    }

    #[test]
    fn test_untrimmed_name_is_distinct() {
        let mut reg = CharacterRegistry::new();
        reg.observe("Alice", 0, 5, "Alice", "");
        reg.observe("Alice ", 10, 16, "Alice ", "");
        reg.observe("", 20, 20, "", "");
        assert_eq!(reg.characters().len(), 3);
    }

    #[test]
    fn test_character_at_position_filters_mentions() {
        let reg = scenario();
        let alice = reg.character_at_position("alice", 10).unwrap();
        assert_eq!(alice.mentions.len(), 1);
        assert_eq!(alice.mentions[0].start, 0);

        let bob = reg.character_at_position("Bob", 15).unwrap();
        assert_eq!(bob.mentions.len(), 2);
        let bob = reg.character_at_position("Bob", 14).unwrap();
        assert_eq!(bob.mentions.len(), 1);
    }

    #[test]
    fn test_position_filter_monotonic() {
        let reg = scenario();
        for p1 in 0..40 {
            for p2 in p1..40 {
                let a = reg.character_at_position("Alice", p1).unwrap().mentions;
                let b = reg.character_at_position("Alice", p2).unwrap().mentions;
                assert!(a.iter().all(|m| b.contains(m)));
            }
        }
    }

    #[test]
    fn test_snapshot_does_not_alias_registry() {
        let reg = scenario();
        let mut snap = reg.character_at_position("Alice", 100).unwrap();
        snap.mentions.clear();
        snap.aliases.push("Ally".into());
        let live = reg.characters().get("alice").unwrap();
        assert_eq!(live.mentions.len(), 2);
        assert_eq!(live.aliases.len(), 1);
    }

    #[test]
    fn test_not_found() {
        let reg = scenario();
        assert!(reg.character_at_position("Mad Hatter", 0).is_none());
    }

    #[test]
    fn test_lookup_ignores_keys_and_aliases() {
        let mut reg = CharacterRegistry::new();
        reg.observe("Mad Hatter", 0, 10, "Mad Hatter", "");
        assert!(reg.character_at_position("mad_hatter", 100).is_none());
        assert!(reg.character_at_position("mad hatter", 100).is_some());
    }

    #[test]
    fn test_first_match_wins_on_shared_primary_name() {
        // Two keys whose primary names only differ in case cannot arise from
        // observe(), so build the document directly.
        let json = r#"{
            "book_metadata": {},
            "characters": {
                "first": {"primary_name": "Alice", "aliases": ["Alice"], "first_appearance": 7},
                "second": {"primary_name": "ALICE", "aliases": ["ALICE"], "first_appearance": 1}
            }
        }"#;
        let reg = CharacterRegistry::from_json(json).unwrap();
        let found = reg.character_at_position("alice", 100).unwrap();
        assert_eq!(found.first_appearance, 7);
    }

    #[test]
    fn test_list_characters() {
        let reg = scenario();
        assert_eq!(reg.list_characters(0), vec!["Alice"]);
        assert_eq!(reg.list_characters(9), vec!["Alice"]);
        assert_eq!(reg.list_characters(10), vec!["Alice", "Bob"]);
        assert!(CharacterRegistry::new().list_characters(1000).is_empty());
    }

    #[test]
    fn test_list_characters_monotonic() {
        let reg = scenario();
        for p1 in 0..40 {
            for p2 in p1..40 {
                let a = reg.list_characters(p1);
                let b = reg.list_characters(p2);
                assert!(a.iter().all(|n| b.contains(n)));
            }
        }
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let mut reg = CharacterRegistry::new();
        reg.metadata.insert("title".into(), Value::String("Alice in Wonderland".into()));
        // Insertion order deliberately not alphabetical.
        reg.observe("Zed", 90, 93, "Zed", "x Zed x");
        reg.observe("Alice", 40, 45, "Alice", "a");
        reg.observe("Zed", 2, 5, "Zed", "b");
        reg.observe("Mad Hatter", 60, 70, "Mad Hatter", "c");

        let back = CharacterRegistry::from_json(&reg.to_json().unwrap()).unwrap();
        assert_eq!(back, reg);
        let keys: Vec<&str> = back.characters().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zed", "alice", "mad_hatter"]);
        let starts: Vec<usize> = back.characters().get("zed").unwrap().mentions.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![90, 2]);
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("characters.json");
        let reg = scenario();
        reg.save(&path).unwrap();
        let loaded = CharacterRegistry::load(&path).unwrap();
        assert_eq!(loaded, reg);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["book_metadata"].is_object());
        assert_eq!(raw["characters"]["bob"]["mentions"][1]["start"], 15);
    }

    #[test]
    fn test_missing_primary_name_is_malformed() {
        let json = r#"{"book_metadata": {}, "characters": {"alice": {"aliases": ["Alice"], "first_appearance": 0, "mentions": []}}}"#;
        let err = CharacterRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::Malformed(_)));
    }

    #[test]
    fn test_missing_aliases_or_first_appearance_is_malformed() {
        let no_aliases = r#"{"characters": {"a": {"primary_name": "A", "first_appearance": 0}}}"#;
        let no_first = r#"{"characters": {"a": {"primary_name": "A", "aliases": ["A"]}}}"#;
        assert!(matches!(CharacterRegistry::from_json(no_aliases), Err(RegistryError::Malformed(_))));
        assert!(matches!(CharacterRegistry::from_json(no_first), Err(RegistryError::Malformed(_))));
    }

    #[test]
    fn test_missing_mentions_defaults_empty() {
        let json = r#"{"characters": {"a": {"primary_name": "A", "aliases": ["A"], "first_appearance": 3}}}"#;
        let reg = CharacterRegistry::from_json(json).unwrap();
        assert!(reg.characters().get("a").unwrap().mentions.is_empty());
        assert!(reg.metadata.is_empty());
    }

    #[test]
    fn test_merge_equals_sequential_observe() {
        let mut first = CharacterRegistry::new();
        first.observe("Alice", 0, 5, "Alice", "");
        let mut second = CharacterRegistry::new();
        second.observe("Bob", 3, 6, "Bob", "");
        second.observe("alice", 1, 6, "alice", "");

        let mut sequential = CharacterRegistry::new();
        sequential.observe("Alice", 0, 5, "Alice", "");
        sequential.observe("Bob", 3, 6, "Bob", "");
        sequential.observe("alice", 1, 6, "alice", "");

        first.merge(second);
        assert_eq!(first, sequential);
        assert_eq!(first.characters().get("alice").unwrap().primary_name, "Alice");
    }
}
