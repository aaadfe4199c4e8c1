use std::collections::HashMap;
use std::sync::RwLock;

/// Game name to helix game id, shared by every collector of a source.
///
/// Keys are exact titles; no case folding or trimming is applied. Entries never expire.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: RwLock<HashMap<String, String>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, game_name: &str) -> Option<String> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.get(game_name).cloned()
    }

    pub fn insert(&self, game_name: &str, game_id: &str) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(game_name.to_string(), game_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
