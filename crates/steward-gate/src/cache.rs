// crates/steward-gate/src/cache.rs
// ============================================================================
// Module: Gate Evaluation Cache
// Description: Insert-once cache keyed by (pr, head SHA, policy hash).
// Purpose: Skip re-evaluation of identical surfaces within one process.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! One evaluation per (pr_number, head_sha, policy_hash) triple. Entries are
//! insertable exactly once; a second insert under the same key is an error,
//! which keeps the cache append-only and replays honest. Internal gate
//! failures never populate the cache, so retries re-evaluate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cache key: pull request number, head SHA, policy hash.
type CacheKey = (u64, String, String);

/// Cache errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The key was already present.
    #[error("gate.cache.duplicate_entry pr={pr_number} sha={head_sha}")]
    DuplicateEntry {
        /// Pull request number of the duplicate.
        pr_number: u64,
        /// Head SHA of the duplicate.
        head_sha: String,
    },
}

/// Insert-once evaluation cache.
///
/// # Invariants
/// - Every key is inserted at most once for the lifetime of the process.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    /// Verdicts keyed by (pr_number, head_sha, policy_hash).
    entries: BTreeMap<CacheKey, bool>,
}

impl EvaluationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cached verdict.
    #[must_use]
    pub fn get(&self, pr_number: u64, head_sha: &str, policy_hash: &str) -> Option<bool> {
        self.entries
            .get(&(pr_number, head_sha.to_string(), policy_hash.to_string()))
            .copied()
    }

    /// Records a verdict exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DuplicateEntry`] when the key already exists.
    pub fn insert_once(
        &mut self,
        pr_number: u64,
        head_sha: &str,
        policy_hash: &str,
        passed: bool,
    ) -> Result<(), CacheError> {
        let key = (pr_number, head_sha.to_string(), policy_hash.to_string());
        if self.entries.contains_key(&key) {
            return Err(CacheError::DuplicateEntry {
                pr_number,
                head_sha: head_sha.to_string(),
            });
        }
        self.entries.insert(key, passed);
        Ok(())
    }

    /// Returns the number of cached verdicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
