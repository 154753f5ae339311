use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fsutil::write_atomic;

/// Persisted record of which steps are already accounted for on a source.
///
/// Every mutation returns a new ledger; the caller persists it, so each file
/// on disk is a complete snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLedger {
    #[serde(default)]
    completed_steps: Vec<String>,
    #[serde(default)]
    user_skipped_steps: Vec<String>,
}

impl ExecutionLedger {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a persisted ledger. A missing or unreadable file yields an empty
    /// ledger: losing resumability beats aborting the run.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ledger at {}", path.display());
                return Self::empty();
            }
            Err(e) => {
                warn!("Failed to read ledger {}: {}; starting fresh", path.display(), e);
                return Self::empty();
            }
        };

        match serde_json::from_str(&content) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Malformed ledger {}: {}; starting fresh", path.display(), e);
                Self::empty()
            }
        }
    }

    /// Write both sets as one snapshot, replacing any previous file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content)?;
        debug!(
            "Saved ledger {} ({} completed, {} skipped)",
            path.display(),
            self.completed_steps.len(),
            self.user_skipped_steps.len()
        );
        Ok(())
    }

    pub fn was_done(&self, name: &str) -> bool {
        self.is_completed(name) || self.is_user_skipped(name)
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.completed_steps.iter().any(|s| s == name)
    }

    pub fn is_user_skipped(&self, name: &str) -> bool {
        self.user_skipped_steps.iter().any(|s| s == name)
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn user_skipped_steps(&self) -> &[String] {
        &self.user_skipped_steps
    }

    pub fn mark_complete(&self, name: &str) -> Self {
        let mut next = self.clone();
        push_unique(&mut next.completed_steps, name);
        next
    }

    pub fn mark_user_skipped(&self, name: &str) -> Self {
        let mut next = self.clone();
        push_unique(&mut next.user_skipped_steps, name);
        next
    }
}

fn push_unique(steps: &mut Vec<String>, name: &str) {
    if !steps.iter().any(|s| s == name) {
        steps.push(name.to_string());
    }
}
