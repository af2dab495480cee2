//! Rule input validation
//!
//! Patterns are compiled with the `regex` crate before a rule is accepted.
//! Its syntax is the same RE2 family the filter engine evaluates, so a
//! pattern that passes here is not rejected at installation time.

use crate::{config::DEFAULT_MAX_PATTERN_LEN, error::RewriteError, Result};
use regex::RegexBuilder;
use rewrite_common::RulePatch;

/// Upper bound on a compiled pattern's size. A short pattern with nested
/// repetition can still expand to a program far larger than its source.
const COMPILED_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct PatternValidator {
    max_pattern_len: usize,
}

impl Default for PatternValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATTERN_LEN)
    }
}

impl PatternValidator {
    pub fn new(max_pattern_len: usize) -> Self {
        Self { max_pattern_len }
    }

    /// Check that `pattern` is non-blank, within the length limit and compiles.
    pub fn validate_pattern(&self, pattern: &str) -> Result<()> {
        if pattern.trim().is_empty() {
            return Err(RewriteError::validation("pattern", "must not be empty"));
        }
        if pattern.len() > self.max_pattern_len {
            return Err(RewriteError::invalid_pattern(
                pattern,
                format!("longer than {} bytes", self.max_pattern_len),
            ));
        }

        RegexBuilder::new(pattern)
            .size_limit(COMPILED_SIZE_LIMIT)
            .build()
            .map(|_| ())
            .map_err(|e| RewriteError::invalid_pattern(pattern, e.to_string()))
    }

    pub fn validate_replacement(&self, replacement: &str) -> Result<()> {
        if replacement.trim().is_empty() {
            return Err(RewriteError::validation("replacement", "must not be empty"));
        }
        Ok(())
    }

    /// Validate a new rule
    pub fn validate_rule(&self, pattern: &str, replacement: &str) -> Result<()> {
        self.validate_pattern(pattern)?;
        self.validate_replacement(replacement)
    }

    /// Validate only the fields a patch supplies
    pub fn validate_patch(&self, patch: &RulePatch) -> Result<()> {
        if let Some(pattern) = &patch.pattern {
            self.validate_pattern(pattern)?;
        }
        if let Some(replacement) = &patch.replacement {
            self.validate_replacement(replacement)?;
        }
        Ok(())
    }
}
