//! In-memory watermark storage.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::store::{StoredState, WatermarkStore};

/// Keeps state documents in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    states: Mutex<HashMap<String, StoredState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping names that currently have a state document.
    pub async fn mappings(&self) -> Vec<String> {
        let mut names: Vec<String> = self.states.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn load_state(&self, mapping: &str) -> Result<Option<StoredState>> {
        Ok(self.states.lock().await.get(mapping).cloned())
    }

    async fn save_state(&self, mapping: &str, state: &StoredState) -> Result<()> {
        self.states
            .lock()
            .await
            .insert(mapping.to_string(), state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
