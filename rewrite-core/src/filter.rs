//! Declarative filter engine boundary
//!
//! The host's request-interception engine holds a list of dynamic rules,
//! each addressed by the engine's own numeric id. This module defines the
//! descriptor format it accepts, the two operations the synchronizer needs,
//! and the pure translation from [`State`] to descriptors.

use crate::Result;
use async_trait::async_trait;
use rewrite_common::{Rule, State};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority given to every installed descriptor
pub const DEFAULT_PRIORITY: u32 = 1;

/// Identifier of an installed filter rule.
///
/// Private to the filter engine and renumbered on every synchronization;
/// never derived from a [`rewrite_common::RuleId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterRuleId(pub u32);

impl fmt::Display for FilterRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request categories a condition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    Ping,
    Media,
    Websocket,
    Other,
}

impl ResourceType {
    /// Every category the engine supports, in its documented order
    pub const ALL: [ResourceType; 12] = [
        ResourceType::MainFrame,
        ResourceType::SubFrame,
        ResourceType::Stylesheet,
        ResourceType::Script,
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Object,
        ResourceType::XmlHttpRequest,
        ResourceType::Ping,
        ResourceType::Media,
        ResourceType::Websocket,
        ResourceType::Other,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub regex_substitution: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActionSpec {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub redirect: Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConditionSpec {
    pub regex_filter: String,
    pub resource_types: Vec<ResourceType>,
}

/// One dynamic rule as the filter engine receives it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub id: FilterRuleId,
    pub priority: u32,
    pub action: RuleActionSpec,
    pub condition: RuleConditionSpec,
}

impl FilterRule {
    /// Redirect descriptor for `rule` under the engine id `id`
    pub fn redirect(id: FilterRuleId, rule: &Rule) -> Self {
        Self {
            id,
            priority: DEFAULT_PRIORITY,
            action: RuleActionSpec {
                action_type: ActionType::Redirect,
                redirect: Redirect {
                    regex_substitution: rule.replacement.clone(),
                },
            },
            condition: RuleConditionSpec {
                regex_filter: rule.pattern.clone(),
                resource_types: ResourceType::ALL.to_vec(),
            },
        }
    }
}

/// Bulk update request. Removals are applied before additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_rule_ids: Vec<FilterRuleId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_rules: Vec<FilterRule>,
}

impl UpdateRuleOptions {
    pub fn remove(ids: Vec<FilterRuleId>) -> Self {
        Self {
            remove_rule_ids: ids,
            add_rules: Vec::new(),
        }
    }

    pub fn add(rules: Vec<FilterRule>) -> Self {
        Self {
            remove_rule_ids: Vec::new(),
            add_rules: rules,
        }
    }
}

/// Filter-engine boundary expected from the host
#[async_trait]
pub trait FilterEngine: Send + Sync {
    /// Ids of all currently installed dynamic rules
    async fn get_dynamic_rule_ids(&self) -> Result<Vec<FilterRuleId>>;

    /// Apply one bulk update
    async fn update_dynamic_rules(&self, options: UpdateRuleOptions) -> Result<()>;
}

/// Translate `state` into the descriptor list the engine should hold.
///
/// Empty when the master switch is off. Otherwise one descriptor per enabled
/// rule, in registration order, numbered from 1.
pub fn build_descriptors(state: &State) -> Vec<FilterRule> {
    state
        .active_rules()
        .zip(1u32..)
        .map(|(rule, id)| FilterRule::redirect(FilterRuleId(id), rule))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_wire_format() {
        let mut state = State::default();
        state.add_rule(r"^http://example\.com/(.*)$", "https://example.com/$1");

        let descriptors = build_descriptors(&state);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(
            serde_json::to_value(&descriptors[0]).unwrap(),
            json!({
                "id": 1,
                "priority": 1,
                "action": {
                    "type": "redirect",
                    "redirect": {"regexSubstitution": "https://example.com/$1"}
                },
                "condition": {
                    "regexFilter": "^http://example\\.com/(.*)$",
                    "resourceTypes": [
                        "main_frame", "sub_frame", "stylesheet", "script",
                        "image", "font", "object", "xmlhttprequest", "ping",
                        "media", "websocket", "other"
                    ]
                }
            })
        );
    }

    #[test]
    fn test_ids_are_sequential_not_rule_ids() {
        let mut state = State::default();
        state.next_rule_id = 500;
        let first = state.add_rule("a", "1").unwrap().id;
        state.add_rule("b", "2");
        state.add_rule("c", "3");
        state.toggle_rule(first);

        let descriptors = build_descriptors(&state);
        let ids: Vec<_> = descriptors.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![FilterRuleId(1), FilterRuleId(2)]);

        let patterns: Vec<_> = descriptors
            .iter()
            .map(|d| d.condition.regex_filter.as_str())
            .collect();
        assert_eq!(patterns, vec!["b", "c"]);
    }

    #[test]
    fn test_master_switch_off_yields_nothing() {
        let mut state = State::default();
        state.add_rule("a", "1");
        state.set_global_enabled(false);
        assert!(build_descriptors(&state).is_empty());
    }

    #[test]
    fn test_update_options_omit_empty_lists() {
        let options = UpdateRuleOptions::remove(vec![FilterRuleId(3)]);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"removeRuleIds": [3]})
        );
    }
}
