//! Filter Synchronizer
//!
//! Makes the filter engine's installed rule set exactly match a [`State`].
//! The sequence is fixed: enumerate installed ids, remove them all in one
//! call, stop if the master switch is off, then install the freshly numbered
//! descriptors in one call. Running it again with the same state installs
//! the same set.

use crate::{
    filter::{build_descriptors, FilterEngine, UpdateRuleOptions},
    Result,
};
use rewrite_common::State;
use serde::Serialize;
use tracing::{debug, info};

/// What one synchronization did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub removed: usize,
    pub installed: usize,
}

pub async fn synchronize<E>(engine: &E, state: &State) -> Result<SyncReport>
where
    E: FilterEngine + ?Sized,
{
    let existing = engine.get_dynamic_rule_ids().await?;
    let removed = existing.len();

    if !existing.is_empty() {
        engine
            .update_dynamic_rules(UpdateRuleOptions::remove(existing))
            .await?;
    }

    if !state.global_enabled {
        info!("Rewriting disabled globally, removed {} filter rules", removed);
        return Ok(SyncReport {
            removed,
            installed: 0,
        });
    }

    let descriptors = build_descriptors(state);
    let installed = descriptors.len();

    if !descriptors.is_empty() {
        engine
            .update_dynamic_rules(UpdateRuleOptions::add(descriptors))
            .await?;
    }

    debug!(
        "Synchronized filter rules: {} removed, {} installed ({} rules in state)",
        removed,
        installed,
        state.rules.len()
    );
    Ok(SyncReport { removed, installed })
}
