pub fn build_analysis_prompt(segment_text: &str, book_title: &str) -> String {
    format!(
        r#"Analyze this text from "{book_title}" and extract the following information in JSON format:

{{
    "characters_mentioned": ["list of character names mentioned"],
    "locations": ["list of locations/scenes mentioned"],
    "key_events": ["list of important events"],
    "mood_tone": "overall mood/tone of this passage",
    "relationships": ["character1-relationship-character2"],
    "themes": ["themes or topics discussed"],
    "dialogue_speakers": ["characters who speak in this passage"],
    "narrative_style": "first person/third person/etc"
}}

Text to analyze:
{segment_text}

Return only valid JSON, no other text."#
    )
}

pub fn build_profile_prompt(character_name: &str, character_context: &str) -> String {
    format!(
        r#"Analyze this character "{character_name}" from the book and extract their personality, speech patterns, and style in JSON format:

{{
    "personality": "detailed personality description",
    "speech_pattern": "how they speak (formal/casual/sarcastic/etc)",
    "key_phrases": ["typical phrases they use"],
    "relationships": "simple text description of their relationships",
    "role_in_story": "their role/importance in the story",
    "character_arc": "how they change throughout the story",
    "dialogue_style": "specific way they speak in dialogue",
    "emotional_range": "their emotional characteristics",
    "background": "what we know about their background"
}}

Character context from the book:
{character_context}

Return only valid JSON, no other text."#
    )
}

pub fn build_alias_prompt(names: &[String]) -> String {
    format!(
        r#"Analyze these character names from a book and identify which ones refer to the same character:

Character names: {}

Return a JSON object where keys are the canonical character names and values are lists of all variations that refer to the same character.

Example format:
{{
    "Harry Potter": ["Harry", "Harry Potter", "Mr. Potter"],
    "Hermione Granger": ["Hermione", "Hermione Granger", "Miss Granger"]
}}

Only include characters that have multiple variations. If a character has only one name, don't include them.
Return only valid JSON, no other text."#,
        names.join(", ")
    )
}

pub fn build_repair_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{invalid_json}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#
    )
}
