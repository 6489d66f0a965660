// crates/steward-forge/src/identity.rs
// ============================================================================
// Module: Repository Identity
// Description: Owner/repo derivation from git remote URLs.
// Purpose: Resolve the forge repository when the environment does not pin it.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! When the environment document does not pin `owner`/`repo`, the supervisor
//! derives them from the `origin` remote. Two URL shapes are recognized:
//! `ssh://git@host:port/owner/repo.git` and `git@host:owner/repo.git`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Repository identity resolution errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The git remote could not be read.
    #[error("forge.identity.remote_unavailable")]
    RemoteUnavailable,
    /// The remote URL shape is not recognized.
    #[error("forge.identity.unsupported_remote_url {0}")]
    UnsupportedRemoteUrl(String),
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// `ssh://git@host[:port]/owner/repo.git` remotes.
static SSH_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// `git@host:owner/repo.git` remotes.
static SCP_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Parses owner and repository from a git remote URL.
///
/// # Errors
///
/// Returns [`IdentityError::UnsupportedRemoteUrl`] when the URL matches
/// neither recognized shape.
pub fn parse_remote_url(url: &str) -> Result<(String, String), IdentityError> {
    let ssh = SSH_PATTERN
        .get_or_init(|| {
            Regex::new(r"ssh://git@[^:/]+(?::\d+)?/(?P<owner>[^/]+)/(?P<repo>.+)\.git").ok()
        })
        .as_ref();
    if let Some(pattern) = ssh
        && let Some(captures) = pattern.captures(url)
    {
        return Ok((captures["owner"].to_string(), captures["repo"].to_string()));
    }
    let scp = SCP_PATTERN
        .get_or_init(|| Regex::new(r"git@[^:/]+:(?P<owner>[^/]+)/(?P<repo>.+)\.git").ok())
        .as_ref();
    if let Some(pattern) = scp
        && let Some(captures) = pattern.captures(url)
    {
        return Ok((captures["owner"].to_string(), captures["repo"].to_string()));
    }
    Err(IdentityError::UnsupportedRemoteUrl(url.to_string()))
}

/// Reads the `origin` remote and derives owner and repository.
///
/// # Errors
///
/// Returns [`IdentityError`] when git is unavailable or the URL is
/// unrecognized.
pub fn repo_identity_from_git() -> Result<(String, String), IdentityError> {
    let output = Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .output()
        .map_err(|_| IdentityError::RemoteUnavailable)?;
    if !output.status.success() {
        return Err(IdentityError::RemoteUnavailable);
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    parse_remote_url(&url)
}
