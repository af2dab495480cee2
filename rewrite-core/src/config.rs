//! Configuration types and utilities

use serde::{Deserialize, Serialize};

/// Storage key the whole state is persisted under
pub const DEFAULT_STATE_KEY: &str = "urlRewriteState";

/// Longest pattern accepted by default, in bytes
pub const DEFAULT_MAX_PATTERN_LEN: usize = 2048;

/// Engine configuration shared by the store, the validator and the mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key the state is persisted under
    pub state_key: String,
    /// Longest pattern accepted by the validator, in bytes
    pub max_pattern_len: usize,
    /// Queued commands per mailbox before senders wait
    pub mailbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_key: DEFAULT_STATE_KEY.to_string(),
            max_pattern_len: DEFAULT_MAX_PATTERN_LEN,
            mailbox_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_pattern_len": 100}"#).unwrap();
        assert_eq!(config.max_pattern_len, 100);
        assert_eq!(config.state_key, DEFAULT_STATE_KEY);
        assert_eq!(config.mailbox_capacity, 64);
    }
}
