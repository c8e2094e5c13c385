//! Reference store configuration

use super::*;
use serde::{Deserialize, Serialize};

/// In-memory store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Entity sets served by the store
    #[serde(default = "default_entity_sets")]
    pub entity_sets: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            entity_sets: default_entity_sets(),
        }
    }
}

impl StoreConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.entity_sets != default_entity_sets() {
            self.entity_sets = other.entity_sets;
        }
        self
    }
}
