//! Character roster: the explicit context object holding loaded definitions
//!
//! One TOML file per character. The roster is built once and handed to
//! every run by reference; nothing looks characters up globally.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use tracing::{debug, info};

use crate::buffs::BaseStatsLookup;
use crate::core::error::{Result, SimError};
use crate::core::types::CharacterId;
use crate::data::character::CharacterDefinition;

/// All character definitions available to a simulation
#[derive(Debug, Clone, Default)]
pub struct CharacterRoster {
    characters: AHashMap<CharacterId, CharacterDefinition>,
}

impl CharacterRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` file in a directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut roster = Self::new();
        for path in paths {
            let content = fs::read_to_string(&path)?;
            let name = path.display().to_string();
            let definition = parse_character(&content, &name)?;
            debug!(character = %definition.id, file = %name, "loaded character");
            roster.insert(definition)?;
        }

        info!("Loaded {} characters from {}", roster.len(), dir.display());
        Ok(roster)
    }

    /// Parse and add one definition from TOML text
    pub fn load_str(&mut self, content: &str, source_name: &str) -> Result<CharacterId> {
        let definition = parse_character(content, source_name)?;
        let id = definition.id.clone();
        self.insert(definition)?;
        Ok(id)
    }

    /// Add a definition; duplicate ids are a data error
    pub fn insert(&mut self, definition: CharacterDefinition) -> Result<()> {
        definition.validate()?;
        if self.characters.contains_key(&definition.id) {
            return Err(SimError::CharacterData {
                source_name: definition.id.to_string(),
                message: "duplicate character id".into(),
            });
        }
        self.characters.insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn get(&self, id: &CharacterId) -> Option<&CharacterDefinition> {
        self.characters.get(id)
    }

    pub fn contains(&self, id: &CharacterId) -> bool {
        self.characters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Ids in sorted order
    pub fn ids(&self) -> Vec<&CharacterId> {
        let mut ids: Vec<_> = self.characters.keys().collect();
        ids.sort();
        ids
    }
}

impl BaseStatsLookup for CharacterRoster {
    fn base_attack(&self, character: &CharacterId) -> Option<f64> {
        self.get(character).map(|c| c.stats.attack)
    }
}

fn parse_character(content: &str, source_name: &str) -> Result<CharacterDefinition> {
    toml::from_str(content).map_err(|e| SimError::CharacterData {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
