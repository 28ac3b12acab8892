/// Persona registry: resolves the character a user is chatting with.
use std::collections::HashMap;

use focusmate_core::{PersonaProfile, PersonaSource};

/// Personas keyed by character key.
#[derive(Debug, Clone, Default)]
pub struct PersonaRegistry {
    personas: HashMap<String, PersonaProfile>,
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(personas: HashMap<String, PersonaProfile>) -> Self {
        Self { personas }
    }

    /// Register or replace the persona for a character key.
    pub fn register(&mut self, character_key: impl Into<String>, persona: PersonaProfile) {
        self.personas.insert(character_key.into(), persona);
    }

    /// All registered character keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.personas.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    /// Persona for a key, falling back to the default companion.
    pub fn persona_or_default(&self, character_key: &str) -> PersonaProfile {
        self.persona(character_key).unwrap_or_default()
    }
}

impl PersonaSource for PersonaRegistry {
    fn persona(&self, character_key: &str) -> Option<PersonaProfile> {
        self.personas.get(character_key).cloned()
    }
}
