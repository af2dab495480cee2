//! Command Dispatcher
//!
//! Applies UI commands to the persisted state and keeps the filter engine in
//! step. Each command runs load → mutate → save → synchronize while holding
//! an exclusive lock, so concurrent commands cannot overwrite each other's
//! changes.

use crate::{
    config::EngineConfig,
    error::RewriteError,
    filter::FilterEngine,
    store::{KeyValueStore, RuleStore},
    sync::{synchronize, SyncReport},
    validation::PatternValidator,
    Result,
};
use rewrite_common::{Command, CommandResponse, State};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct Dispatcher {
    store: RuleStore,
    engine: Arc<dyn FilterEngine>,
    validator: PatternValidator,
    /// Held for the full load → save → synchronize sequence
    lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(store: RuleStore, engine: Arc<dyn FilterEngine>) -> Self {
        Self {
            store,
            engine,
            validator: PatternValidator::default(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(
        backend: Arc<dyn KeyValueStore>,
        engine: Arc<dyn FilterEngine>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(RuleStore::with_key(backend, config.state_key.clone()), engine)
            .with_validator(PatternValidator::new(config.max_pattern_len))
    }

    pub fn with_validator(mut self, validator: PatternValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Re-assert the installed filter rules from the persisted state.
    ///
    /// Run once at process start and whenever the host reinstalls; the
    /// engine's dynamic rules are not trusted to survive on their own.
    pub async fn resync(&self) -> Result<SyncReport> {
        let _guard = self.lock.lock().await;
        let state = self.store.load().await?;
        let report = synchronize(self.engine.as_ref(), &state).await?;
        info!(
            "Startup synchronization installed {} filter rules ({} removed)",
            report.installed, report.removed
        );
        Ok(report)
    }

    /// Handle one command and return the state that was persisted and
    /// synchronized.
    pub async fn dispatch(&self, command: Command) -> Result<State> {
        self.validate(&command)?;

        let _guard = self.lock.lock().await;
        let mut state = self.store.load().await?;

        if !command.is_mutating() {
            return Ok(state);
        }

        let kind = command.kind();
        apply(&mut state, command)?;

        self.store.save(&state).await?;
        let report = synchronize(self.engine.as_ref(), &state).await?;

        info!(
            "{} applied: {} rules, {} installed, global {}",
            kind,
            state.rules.len(),
            report.installed,
            if state.global_enabled { "on" } else { "off" }
        );
        Ok(state)
    }

    /// Parse and dispatch a raw protocol message, keeping the error so the
    /// caller can tell a refused command from a failing backend.
    pub async fn process(&self, message: Value) -> Result<State> {
        let command = parse_command(message).map_err(|e| {
            warn!("Rejected message: {}", e);
            e
        })?;

        let kind = command.kind();
        self.dispatch(command).await.map_err(|e| {
            if e.is_client_error() {
                warn!("{} rejected: {}", kind, e);
            } else {
                error!("{} failed: {}", kind, e);
            }
            e
        })
    }

    /// Handle a raw protocol message. Never fails: every problem becomes an
    /// error response and the state is left as it was.
    pub async fn handle_message(&self, message: Value) -> CommandResponse {
        match self.process(message).await {
            Ok(state) => CommandResponse::State(state),
            Err(e) => CommandResponse::error(e.to_string()),
        }
    }

    fn validate(&self, command: &Command) -> Result<()> {
        match command {
            Command::AddRule {
                pattern,
                replacement,
            } => self.validator.validate_rule(pattern, replacement),
            Command::UpdateRule { updates, .. } => self.validator.validate_patch(updates),
            _ => Ok(()),
        }
    }
}

fn apply(state: &mut State, command: Command) -> Result<()> {
    match command {
        Command::GetState => {}
        Command::SetGlobalEnabled { enabled } => state.set_global_enabled(enabled),
        Command::AddRule {
            pattern,
            replacement,
        } => {
            let rule = state
                .add_rule(pattern, replacement)
                .ok_or_else(|| RewriteError::validation("ruleId", "rule id space exhausted"))?;
            debug!("Added rule {}", rule.id);
        }
        Command::UpdateRule { rule_id, updates } => {
            if !state.update_rule(rule_id, updates) {
                debug!("UPDATE_RULE: no rule with id {}", rule_id);
            }
        }
        Command::DeleteRule { rule_id } => {
            if !state.delete_rule(rule_id) {
                debug!("DELETE_RULE: no rule with id {}", rule_id);
            }
        }
        Command::ToggleRule { rule_id } => {
            if !state.toggle_rule(rule_id) {
                debug!("TOGGLE_RULE: no rule with id {}", rule_id);
            }
        }
    }
    Ok(())
}

/// Decode a protocol message into a [`Command`].
///
/// A missing or unrecognized `type` is [`RewriteError::UnknownCommand`];
/// a recognized type with bad fields is [`RewriteError::MalformedCommand`].
pub fn parse_command(message: Value) -> Result<Command> {
    let kind = message
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    match kind {
        Some(kind) if Command::KINDS.contains(&kind.as_str()) => serde_json::from_value(message)
            .map_err(|e| RewriteError::MalformedCommand {
                kind,
                reason: e.to_string(),
            }),
        kind => Err(RewriteError::UnknownCommand { kind }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryFilterEngine;
    use crate::store::MemoryKeyValueStore;
    use rewrite_common::RuleId;
    use serde_json::json;

    fn dispatcher() -> (Dispatcher, Arc<MemoryFilterEngine>) {
        let engine = Arc::new(MemoryFilterEngine::new());
        let store = RuleStore::new(Arc::new(MemoryKeyValueStore::new()));
        (Dispatcher::new(store, engine.clone()), engine)
    }

    #[test]
    fn test_parse_unknown_and_malformed() {
        assert!(matches!(
            parse_command(json!({"type": "RESET"})),
            Err(RewriteError::UnknownCommand { kind: Some(_) })
        ));
        assert!(matches!(
            parse_command(json!({"enabled": true})),
            Err(RewriteError::UnknownCommand { kind: None })
        ));
        assert!(matches!(
            parse_command(json!({"type": "ADD_RULE", "pattern": "a"})),
            Err(RewriteError::MalformedCommand { .. })
        ));
        assert!(matches!(
            parse_command(json!({"type": "TOGGLE_RULE", "ruleId": "seven"})),
            Err(RewriteError::MalformedCommand { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_rule_installs_filter() {
        let (dispatcher, engine) = dispatcher();

        let state = dispatcher
            .dispatch(Command::AddRule {
                pattern: r"^http://example\.com/(.*)$".into(),
                replacement: "https://example.com/$1".into(),
            })
            .await
            .unwrap();

        assert_eq!(state.rules.len(), 1);
        assert!(state.rules[0].enabled);
        assert_eq!(engine.installed().await.len(), 1);
        assert_eq!(dispatcher.store().load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_invalid_pattern_changes_nothing() {
        let (dispatcher, engine) = dispatcher();

        let err = dispatcher
            .dispatch(Command::AddRule {
                pattern: "(unclosed".into(),
                replacement: "https://x/".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RewriteError::InvalidPattern { .. }));
        assert_eq!(dispatcher.store().load().await.unwrap(), State::default());
        assert_eq!(engine.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_message_leaves_state() {
        let (dispatcher, _engine) = dispatcher();
        dispatcher
            .handle_message(json!({"type": "ADD_RULE", "pattern": "a", "replacement": "b"}))
            .await;
        let before = dispatcher.store().load().await.unwrap();

        let response = dispatcher.handle_message(json!({"type": "EXPORT_RULES"})).await;
        assert_eq!(response, CommandResponse::error("Unknown message type"));
        assert_eq!(dispatcher.store().load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_missing_rule_is_noop() {
        let (dispatcher, engine) = dispatcher();
        let before = dispatcher
            .dispatch(Command::AddRule {
                pattern: "a".into(),
                replacement: "b".into(),
            })
            .await
            .unwrap();
        let installed_before = engine.installed().await;

        let after = dispatcher
            .dispatch(Command::UpdateRule {
                rule_id: RuleId(424242),
                updates: rewrite_common::RulePatch {
                    pattern: Some("x".into()),
                    replacement: None,
                },
            })
            .await
            .unwrap();

        assert_eq!(after, before);
        assert_eq!(engine.installed().await, installed_before);
    }

    #[tokio::test]
    async fn test_exhausted_ids_reject_add() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        backend
            .set(
                crate::config::DEFAULT_STATE_KEY,
                json!({
                    "globalEnabled": true,
                    "rules": [{"id": u64::MAX, "pattern": "a", "replacement": "b", "enabled": true}]
                }),
            )
            .await
            .unwrap();
        let engine = Arc::new(MemoryFilterEngine::new());
        let dispatcher = Dispatcher::new(RuleStore::new(backend), engine.clone());
        let before = dispatcher.store().load().await.unwrap();

        let err = dispatcher
            .process(json!({"type": "ADD_RULE", "pattern": "c", "replacement": "d"}))
            .await
            .unwrap_err();

        assert!(matches!(err, RewriteError::Validation { .. }));
        assert!(err.is_client_error());
        assert_eq!(dispatcher.store().load().await.unwrap(), before);
        assert_eq!(engine.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_state_does_not_sync() {
        let (dispatcher, engine) = dispatcher();
        let state = dispatcher.dispatch(Command::GetState).await.unwrap();
        assert_eq!(state, State::default());
        assert_eq!(engine.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_resync_restores_engine() {
        let (dispatcher, engine) = dispatcher();
        dispatcher
            .dispatch(Command::AddRule {
                pattern: "a".into(),
                replacement: "b".into(),
            })
            .await
            .unwrap();

        // Host dropped its dynamic rules
        let ids = engine.get_dynamic_rule_ids().await.unwrap();
        engine
            .update_dynamic_rules(crate::filter::UpdateRuleOptions::remove(ids))
            .await
            .unwrap();
        assert!(engine.installed().await.is_empty());

        let report = dispatcher.resync().await.unwrap();
        assert_eq!(report.installed, 1);
        assert_eq!(engine.installed().await.len(), 1);
    }
}
