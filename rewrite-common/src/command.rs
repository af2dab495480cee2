//! Command protocol between the UI and the background engine.
//!
//! Each request message carries a `type` discriminator; each yields exactly
//! one [`CommandResponse`].

use crate::rule::{RuleId, RulePatch, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    GetState,
    SetGlobalEnabled {
        enabled: bool,
    },
    AddRule {
        pattern: String,
        replacement: String,
    },
    UpdateRule {
        #[serde(rename = "ruleId")]
        rule_id: RuleId,
        #[serde(default)]
        updates: RulePatch,
    },
    DeleteRule {
        #[serde(rename = "ruleId")]
        rule_id: RuleId,
    },
    ToggleRule {
        #[serde(rename = "ruleId")]
        rule_id: RuleId,
    },
}

impl Command {
    /// Every message type this protocol understands
    pub const KINDS: [&'static str; 6] = [
        "GET_STATE",
        "SET_GLOBAL_ENABLED",
        "ADD_RULE",
        "UPDATE_RULE",
        "DELETE_RULE",
        "TOGGLE_RULE",
    ];

    /// The wire discriminator of this command
    pub fn kind(&self) -> &'static str {
        match self {
            Command::GetState => "GET_STATE",
            Command::SetGlobalEnabled { .. } => "SET_GLOBAL_ENABLED",
            Command::AddRule { .. } => "ADD_RULE",
            Command::UpdateRule { .. } => "UPDATE_RULE",
            Command::DeleteRule { .. } => "DELETE_RULE",
            Command::ToggleRule { .. } => "TOGGLE_RULE",
        }
    }

    /// Whether handling this command persists and re-synchronizes
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Command::GetState)
    }
}

/// Response to a single command: the resulting state, or an error result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    State(State),
    Error { error: String },
}

impl CommandResponse {
    pub fn error(message: impl Into<String>) -> Self {
        CommandResponse::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CommandResponse::Error { .. })
    }

    pub fn state(&self) -> Option<&State> {
        match self {
            CommandResponse::State(state) => Some(state),
            CommandResponse::Error { .. } => None,
        }
    }

    pub fn into_state(self) -> Option<State> {
        match self {
            CommandResponse::State(state) => Some(state),
            CommandResponse::Error { .. } => None,
        }
    }
}

impl From<State> for CommandResponse {
    fn from(state: State) -> Self {
        CommandResponse::State(state)
    }
}
