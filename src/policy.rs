//! Per-group guard policies, loaded from a JSON file.
//!
//! ```json
//! {
//!   "120363000000000001@g.us": {
//!     "guards": [
//!       { "guardId": "no-links" },
//!       { "guardId": "no-spam", "params": { "maxMessages": 3 } }
//!     ],
//!     "moderation": { "observationMode": false }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{GuardConfig, ModerationConfig};
use crate::error::PolicyError;
use crate::guards::GuardRegistry;

/// Guards and enforcement settings for one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPolicy {
    /// Evaluated in order; the first blocking guard is reported.
    #[serde(default)]
    pub guards: Vec<GuardConfig>,
    #[serde(default)]
    pub moderation: ModerationConfig,
}

impl GroupPolicy {
    pub fn new(guards: Vec<GuardConfig>, moderation: ModerationConfig) -> Self {
        Self { guards, moderation }
    }
}

/// A guard id in a group policy that no registered guard answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGuard {
    pub chat_id: String,
    pub guard_id: String,
}

/// Every group's policy, keyed by chat id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyBook {
    groups: HashMap<String, GroupPolicy>,
}

impl PolicyBook {
    /// Read and parse a policy file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PolicyError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn get(&self, chat_id: &str) -> Option<&GroupPolicy> {
        self.groups.get(chat_id)
    }

    pub fn insert(&mut self, chat_id: &str, policy: GroupPolicy) {
        self.groups.insert(chat_id.to_string(), policy);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Guard ids referenced by any group but missing from `registry`,
    /// sorted by chat id. These are skipped at evaluation time.
    pub fn validate(&self, registry: &GuardRegistry) -> Vec<UnknownGuard> {
        let mut unknown: Vec<UnknownGuard> = self
            .groups
            .iter()
            .flat_map(|(chat_id, policy)| {
                policy
                    .guards
                    .iter()
                    .filter(|g| !registry.contains(&g.guard_id))
                    .map(move |g| UnknownGuard {
                        chat_id: chat_id.clone(),
                        guard_id: g.guard_id.clone(),
                    })
            })
            .collect();
        unknown.sort_by(|a, b| a.chat_id.cmp(&b.chat_id));
        unknown
    }
}
