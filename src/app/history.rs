use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub(crate) const HISTORY_CAPACITY: usize = 10;

/// Recently searched addresses, most recent first, without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SearchHistory {
    entries: Vec<String>,
}

impl SearchHistory {
    pub(crate) fn entries(&self) -> &[String] {
        &self.entries
    }

    pub(crate) fn record(&mut self, address: &str) {
        let address = address.trim();
        if address.is_empty() {
            return;
        }
        self.entries.retain(|entry| entry != address);
        self.entries.insert(0, address.to_owned());
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub(crate) fn remove(&mut self, address: &str) {
        self.entries.retain(|entry| entry != address);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Loads a history file. A missing file is an empty history.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read search history {}", path.display()))?;
        let stored: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to decode search history {}", path.display()))?;

        let mut history = Self::default();
        for address in stored.iter().rev() {
            history.record(address);
        }
        Ok(history)
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let encoded = serde_json::to_string_pretty(&self.entries)
            .context("failed to encode search history")?;
        fs::write(path, encoded)
            .with_context(|| format!("failed to write search history {}", path.display()))
    }
}
