//! Rewrite Core Library
//!
//! Background synchronization engine for user-defined URL rewrite rules:
//! the persisted rule state, the command protocol that mutates it, and the
//! translation of that state into the declarative filter engine's rules.
//!
//! ```text
//! command ──► Dispatcher ──► RuleStore (load/save)
//!                  │
//!                  └──► synchronize ──► FilterEngine
//! ```

/// Persistence boundary and the rule store
pub mod store;

/// SQLite key-value backend
pub mod database;

/// Filter engine boundary and descriptor format
pub mod filter;

/// In-process filter engine
pub mod engine;

pub mod sync;
pub mod dispatcher;
pub mod mailbox;
pub mod validation;

/// Configuration types and utilities
pub mod config;

/// Error types for engine operations
pub mod error;

pub use config::{EngineConfig, DEFAULT_MAX_PATTERN_LEN, DEFAULT_STATE_KEY};
pub use database::SqliteKeyValueStore;
pub use dispatcher::{parse_command, Dispatcher};
pub use engine::MemoryFilterEngine;
pub use error::RewriteError;
pub use filter::{
    build_descriptors, FilterEngine, FilterRule, FilterRuleId, ResourceType, UpdateRuleOptions,
};
pub use mailbox::{spawn_dispatcher, DispatcherHandle};
pub use store::{KeyValueStore, MemoryKeyValueStore, RuleStore};
pub use sync::{synchronize, SyncReport};
pub use validation::PatternValidator;

pub use rewrite_common::{Command, CommandResponse, Rule, RuleId, RulePatch, State};

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, RewriteError>;
