// crates/steward-forge/src/lib.rs
// ============================================================================
// Module: Steward Forge Library
// Description: Forge REST seam, wire types, redaction, and gate logging.
// Purpose: Give the control plane a deterministic view of the forge host.
// Dependencies: regex, reqwest, serde, serde_json, thiserror, time, url
// ============================================================================

//! ## Overview
//! Steward Forge wraps the issue/PR host's REST surface behind the
//! [`ForgeApi`] seam. The blocking HTTP implementation bounds every request,
//! fails closed on malformed payloads, and never logs credentials: the gate
//! log stream redacts Authorization headers and tokens before write.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod identity;
pub mod log;
pub mod redact;
pub mod signature;
pub mod types;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::ForgeApi;
pub use client::ForgeError;
pub use client::HttpForge;
pub use client::normalize_api_base;
pub use identity::IdentityError;
pub use identity::parse_remote_url;
pub use identity::repo_identity_from_git;
pub use log::DEFAULT_GATE_LOG_PATH;
pub use log::GateLog;
pub use log::utc_timestamp;
pub use redact::sanitize;
pub use types::Account;
pub use types::BranchRef;
pub use types::CommitSignature;
pub use types::CommitStatus;
pub use types::Issue;
pub use types::Label;
pub use types::Milestone;
pub use types::PullRequest;
pub use types::Review;
pub use types::StatusState;
pub use types::TimelineEvent;

#[cfg(test)]
mod tests;
