//! Static keyword→reply table.
//!
//! Loaded once at startup from a JSON object (`{"keyword": "reply", ...}`)
//! and read-only afterwards. The table is checked before any session or
//! completion-provider involvement, so keyword hits are cheap and never
//! touch conversation history.

use relay_common::{Error, Result};
use std::path::Path;

/// Immutable keyword→reply mapping.
///
/// Lookup is exact, case-sensitive substring containment against the
/// incoming message, scanning keywords in the order they appear in the
/// source file. The first matching keyword wins, so reordering the file
/// changes behavior; that first-match-in-declared-order rule is part of
/// the contract. Short keywords will also match inside longer unrelated
/// words.
#[derive(Debug, Clone, Default)]
pub struct ReplyTable {
    entries: Vec<(String, String)>,
}

impl ReplyTable {
    /// Build a table from a JSON object string.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut entries = Vec::with_capacity(map.len());
        for (keyword, value) in map {
            let reply = value
                .as_str()
                .ok_or_else(|| {
                    Error::Config(format!("Reply for keyword '{}' is not a string", keyword))
                })?
                .to_string();
            entries.push((keyword, reply));
        }

        Ok(Self { entries })
    }

    /// Load a table from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read reply table from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Return the canned reply for the first keyword contained in `message`.
    pub fn lookup(&self, message: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(keyword, _)| message.contains(keyword.as_str()))
            .map(|(_, reply)| reply.as_str())
    }

    /// Number of configured keywords.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no keywords.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
