//! In-process filter engine
//!
//! Stands in for the host's declarative request-filtering engine: it keeps
//! the installed dynamic rules, applies bulk updates all-or-nothing, and can
//! evaluate a URL against what is installed to preview the redirect.

use crate::{
    error::RewriteError,
    filter::{FilterEngine, FilterRule, FilterRuleId, UpdateRuleOptions},
    Result,
};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct InstalledRule {
    descriptor: FilterRule,
    regex: Regex,
}

#[derive(Debug, Default)]
pub struct MemoryFilterEngine {
    rules: RwLock<BTreeMap<FilterRuleId, InstalledRule>>,
    update_calls: AtomicU64,
}

impl MemoryFilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of installed descriptors, ordered by id
    pub async fn installed(&self) -> Vec<FilterRule> {
        self.rules
            .read()
            .await
            .values()
            .map(|rule| rule.descriptor.clone())
            .collect()
    }

    /// Number of `update_dynamic_rules` calls accepted so far
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::Relaxed)
    }

    /// Redirect target for `url`, if an installed rule matches.
    ///
    /// Highest priority wins, then lowest id. The first match of the rule's
    /// filter within the URL is replaced by its substitution.
    pub async fn evaluate(&self, url: &str) -> Option<String> {
        let rules = self.rules.read().await;

        let mut candidates: Vec<&InstalledRule> = rules.values().collect();
        candidates.sort_by(|a, b| {
            b.descriptor
                .priority
                .cmp(&a.descriptor.priority)
                .then(a.descriptor.id.cmp(&b.descriptor.id))
        });

        candidates
            .into_iter()
            .find(|rule| rule.regex.is_match(url))
            .map(|rule| {
                let template =
                    expand_template(&rule.descriptor.action.redirect.regex_substitution);
                rule.regex.replace(url, template.as_str()).into_owned()
            })
    }
}

#[async_trait]
impl FilterEngine for MemoryFilterEngine {
    async fn get_dynamic_rule_ids(&self) -> Result<Vec<FilterRuleId>> {
        Ok(self.rules.read().await.keys().copied().collect())
    }

    async fn update_dynamic_rules(&self, options: UpdateRuleOptions) -> Result<()> {
        let mut rules = self.rules.write().await;

        // Work on a copy so a rejected batch leaves nothing behind
        let mut next = rules.clone();
        for id in &options.remove_rule_ids {
            next.remove(id);
        }

        for descriptor in options.add_rules {
            if next.contains_key(&descriptor.id) {
                return Err(RewriteError::FilterEngine(format!(
                    "Rule with id {} already exists",
                    descriptor.id
                )));
            }

            let regex = Regex::new(&descriptor.condition.regex_filter).map_err(|e| {
                RewriteError::FilterEngine(format!(
                    "Rule with id {} specified an invalid regexFilter: {}",
                    descriptor.id, e
                ))
            })?;

            next.insert(descriptor.id, InstalledRule { descriptor, regex });
        }

        debug!("Filter engine now holds {} rules", next.len());
        *rules = next;
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Convert single-digit back-references (`\1`, `$1`) to the braced `regex`
/// expansion syntax, so a following letter or digit is never read as part
/// of the group name. `$$` and `${name}` pass through untouched.
fn expand_template(substitution: &str) -> String {
    let mut out = String::with_capacity(substitution.len());
    let mut chars = substitution.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    chars.next();
                    out.push_str("${");
                    out.push(d);
                    out.push('}');
                }
                Some('$') => {
                    chars.next();
                    out.push_str("$$");
                }
                _ => out.push('$'),
            }
            continue;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                out.push_str("${");
                out.push(d);
                out.push('}');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }

    out
}
