//! Rule and State types
//!
//! These are the values persisted under the state key and returned to the UI
//! after every command. Field names on the wire are camelCase so that a state
//! written by any client of the command protocol deserializes unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a user rule.
///
/// Allocated by [`State::add_rule`] and never reused, even after the rule is
/// deleted. This numbering is unrelated to the filter engine's own rule ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RuleId {
    fn from(value: u64) -> Self {
        RuleId(value)
    }
}

/// One user-defined rewrite directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    /// Regular expression matched against request URLs
    pub pattern: String,
    /// Regex-substitution template used to build the redirect target
    pub replacement: String,
    pub enabled: bool,
}

/// Partial update for an existing rule. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

/// The complete synchronized unit: master switch plus ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Master switch. When false no rule is active, whatever its own flag says.
    pub global_enabled: bool,

    /// Rules in insertion order, which is also installation order.
    pub rules: Vec<Rule>,

    /// Id allocator high-water mark. States written without it derive it from
    /// the highest existing id on the next allocation.
    #[serde(default)]
    pub next_rule_id: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            global_enabled: true,
            rules: Vec::new(),
            next_rule_id: 1,
        }
    }
}

impl State {
    /// Look up a rule by id
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    fn rule_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|rule| rule.id == id)
    }

    /// Rules that should currently be installed, in registration order.
    /// Empty when the master switch is off.
    pub fn active_rules(&self) -> impl Iterator<Item = &Rule> {
        let global_enabled = self.global_enabled;
        self.rules
            .iter()
            .filter(move |rule| global_enabled && rule.enabled)
    }

    pub fn set_global_enabled(&mut self, enabled: bool) {
        self.global_enabled = enabled;
    }

    /// Append a new enabled rule and return it, or `None` once the id space
    /// is exhausted.
    ///
    /// The pattern is not validated here; callers that accept user input run
    /// it through the core's pattern validator first.
    pub fn add_rule(
        &mut self,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Option<&Rule> {
        let id = self.allocate_id()?;
        self.rules.push(Rule {
            id,
            pattern: pattern.into(),
            replacement: replacement.into(),
            enabled: true,
        });
        self.rules.last()
    }

    /// Replace the supplied fields of rule `id`. Returns false if no such rule.
    pub fn update_rule(&mut self, id: RuleId, patch: RulePatch) -> bool {
        let Some(rule) = self.rule_mut(id) else {
            return false;
        };
        if let Some(pattern) = patch.pattern {
            rule.pattern = pattern;
        }
        if let Some(replacement) = patch.replacement {
            rule.replacement = replacement;
        }
        true
    }

    /// Remove rule `id`, keeping the order of the rest. Returns false if no such rule.
    pub fn delete_rule(&mut self, id: RuleId) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.id != id);
        self.rules.len() != before
    }

    /// Flip the `enabled` flag of rule `id`. Returns false if no such rule.
    pub fn toggle_rule(&mut self, id: RuleId) -> bool {
        match self.rule_mut(id) {
            Some(rule) => {
                rule.enabled = !rule.enabled;
                true
            }
            None => false,
        }
    }

    /// Next unused id. Never hands out an id at or below any existing one,
    /// and `u64::MAX` is never handed out, so the high-water mark always fits.
    fn allocate_id(&mut self) -> Option<RuleId> {
        let mut id = self.next_rule_id.max(1);
        for rule in &self.rules {
            id = id.max(rule.id.0.checked_add(1)?);
        }
        self.next_rule_id = id.checked_add(1)?;
        Some(RuleId(id))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Delete(usize),
        Toggle(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Add),
            (0usize..8).prop_map(Op::Delete),
            (0usize..8).prop_map(Op::Toggle),
        ]
    }

    proptest! {
        /// Every id ever handed out is distinct, across deletions.
        #[test]
        fn prop_ids_never_reused(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut state = State::default();
            let mut seen = HashSet::new();

            for op in ops {
                match op {
                    Op::Add => {
                        let id = state.add_rule("p", "r").unwrap().id;
                        prop_assert!(seen.insert(id), "id {} handed out twice", id);
                    }
                    Op::Delete(i) => {
                        if let Some(id) = state.rules.get(i).map(|r| r.id) {
                            prop_assert!(state.delete_rule(id));
                            prop_assert!(!state.delete_rule(id));
                        }
                    }
                    Op::Toggle(i) => {
                        if let Some(id) = state.rules.get(i).map(|r| r.id) {
                            state.toggle_rule(id);
                        }
                    }
                }
            }
        }

        /// Toggling twice restores the original flag.
        #[test]
        fn prop_toggle_is_involution(count in 1usize..10, pick in 0usize..10) {
            let mut state = State::default();
            for _ in 0..count {
                state.add_rule("p", "r");
            }
            let id = state.rules[pick % count].id;
            let before = state.clone();

            state.toggle_rule(id);
            state.toggle_rule(id);
            prop_assert_eq!(state, before);
        }
    }
}
