//! Common types for the URL rewrite synchronizer
//!
//! Shared by the core engine, the agent and the tests:
//! - [`Rule`], [`RuleId`], [`RulePatch`] and [`State`], the persisted model
//! - [`Command`] and [`CommandResponse`], the UI command protocol

pub mod command;
pub mod rule;

pub use command::{Command, CommandResponse};
pub use rule::{Rule, RuleId, RulePatch, State};
