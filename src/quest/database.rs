//! Quest database - every quest config found on disk

use bevy::prelude::*;
use std::fs;
use std::path::Path;

use super::config::{QuestConfig, QuestKind};

/// Default directory holding one TOML file per quest
pub const QUESTS_DIR: &str = "config/quests";

/// Database of all loaded quests
#[derive(Resource, Default, Debug, Clone)]
pub struct QuestDatabase {
    pub quests: Vec<QuestConfig>,
}

impl QuestDatabase {
    /// Built-in presets, one per quest kind
    pub fn default_quests() -> Self {
        Self {
            quests: QuestKind::ALL.iter().map(|k| k.default_config()).collect(),
        }
    }

    /// Load every `*.toml` in `dir` (sorted by file name), falling back to the
    /// presets when the directory is missing or holds no valid quest
    pub fn load_from_dir(dir: &str) -> Self {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read quests from {}: {}, using defaults", dir, e);
                return Self::default_quests();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut quests = Vec::new();
        for path in &paths {
            match QuestConfig::load(path) {
                Ok(config) => {
                    config.warn_if_invalid();
                    quests.push(config);
                }
                Err(e) => warn!("{}", e),
            }
        }

        if quests.is_empty() {
            warn!("No quests loaded from {}, using defaults", dir);
            return Self::default_quests();
        }
        info!("Loaded {} quests from {}", quests.len(), dir);
        Self { quests }
    }

    /// Load a single quest file, or the preset for `fallback`
    pub fn load_file_or_preset(path: &Path, fallback: QuestKind) -> QuestConfig {
        match QuestConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}, using {} preset", e, fallback.display_name());
                fallback.default_config()
            }
        }
    }

    /// Find by name (case-insensitive) or, failing that, by kind
    pub fn find(&self, name: &str) -> Option<&QuestConfig> {
        self.quests
            .iter()
            .find(|q| q.name.eq_ignore_ascii_case(name.trim()))
            .or_else(|| {
                let kind = QuestKind::from_str(name)?;
                self.quests.iter().find(|q| q.kind == kind)
            })
    }

    pub fn get(&self, index: usize) -> Option<&QuestConfig> {
        self.quests.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.quests.iter().map(|q| q.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_falls_back() {
        let db = QuestDatabase::load_from_dir("definitely/not/here");
        assert_eq!(db.len(), QuestKind::ALL.len());
    }

    #[test]
    fn test_find_by_name_or_kind() {
        let db = QuestDatabase::default_quests();
        assert_eq!(db.find("archer").map(|q| q.kind), Some(QuestKind::Archer));
        assert_eq!(db.find("Rising Orb").map(|q| q.kind), Some(QuestKind::RisingOrb));
        assert_eq!(db.find("cart").map(|q| q.kind), Some(QuestKind::MomentumCart));
        assert!(db.find("nothing").is_none());
    }

    #[test]
    fn test_shipped_quest_files_parse() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/config/quests");
        let db = QuestDatabase::load_from_dir(dir);
        assert!(db.len() >= 6);
        for quest in &db.quests {
            assert!(quest.validate().is_empty(), "{}: {:?}", quest.name, quest.validate());
        }
    }
}
