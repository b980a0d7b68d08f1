use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalizer::{string_list, string_or, tidy_name};

/// Structured information extracted from one segment of book text.
///
/// Built field-by-field from untrusted oracle JSON; missing or mistyped
/// fields coerce to sensible values instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnalysis {
    pub characters_mentioned: Vec<String>,
    pub locations: Vec<String>,
    pub key_events: Vec<String>,
    pub mood_tone: String,
    pub relationships: Vec<String>,
    pub themes: Vec<String>,
    pub dialogue_speakers: Vec<String>,
    pub narrative_style: String,
}

impl Default for SegmentAnalysis {
    fn default() -> Self {
        Self {
            characters_mentioned: Vec::new(),
            locations: Vec::new(),
            key_events: Vec::new(),
            mood_tone: "neutral".to_string(),
            relationships: Vec::new(),
            themes: Vec::new(),
            dialogue_speakers: Vec::new(),
            narrative_style: "unknown".to_string(),
        }
    }
}

impl SegmentAnalysis {
    pub fn from_value(value: &Value) -> Self {
        Self {
            characters_mentioned: name_list(value.get("characters_mentioned")),
            locations: string_list(value.get("locations")),
            key_events: string_list(value.get("key_events")),
            mood_tone: string_or(value.get("mood_tone"), "neutral"),
            relationships: string_list(value.get("relationships")),
            themes: string_list(value.get("themes")),
            dialogue_speakers: name_list(value.get("dialogue_speakers")),
            narrative_style: string_or(value.get("narrative_style"), "unknown"),
        }
    }
}

fn name_list(value: Option<&Value>) -> Vec<String> {
    string_list(value)
        .iter()
        .map(|n| tidy_name(n))
        .filter(|n| !n.is_empty())
        .collect()
}

/// Persona profile synthesized for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub personality: String,
    pub speech_pattern: String,
    pub key_phrases: Vec<String>,
    pub relationships: String,
    pub role_in_story: String,
    pub character_arc: String,
    pub dialogue_style: String,
    pub emotional_range: String,
    pub background: String,
}

impl CharacterProfile {
    pub fn from_value(value: &Value) -> Self {
        Self {
            personality: string_or(value.get("personality"), ""),
            speech_pattern: string_or(value.get("speech_pattern"), ""),
            key_phrases: string_list(value.get("key_phrases")),
            relationships: string_or(value.get("relationships"), ""),
            role_in_story: string_or(value.get("role_in_story"), ""),
            character_arc: string_or(value.get("character_arc"), ""),
            dialogue_style: string_or(value.get("dialogue_style"), ""),
            emotional_range: string_or(value.get("emotional_range"), ""),
            background: string_or(value.get("background"), ""),
        }
    }
}
