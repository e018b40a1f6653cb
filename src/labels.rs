//! Class label table
//!
//! Maps the integer class ids emitted by the model to readable names.
//! Loaded once at startup from a text file with one `<id> <name>` pair per line.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("failed to read label file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed label file at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Immutable id -> name lookup
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<u32, String>,
}

impl LabelTable {
    /// Read and parse a label file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse label file contents
    ///
    /// The id is the first whitespace-delimited token; everything after it,
    /// trimmed, is the name. Blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self, LabelError> {
        let mut labels = HashMap::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (id, name) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| LabelError::Malformed {
                    line: idx + 1,
                    reason: format!("expected `<id> <name>`, got {:?}", line),
                })?;

            let id: u32 = id.parse().map_err(|_| LabelError::Malformed {
                line: idx + 1,
                reason: format!("invalid class id {:?}", id),
            })?;

            labels.insert(id, name.trim().to_string());
        }

        Ok(Self { labels })
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
