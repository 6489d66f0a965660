// crates/steward-forge/src/signature.rs
// ============================================================================
// Module: Local Signature Probe
// Description: git-based signature classification for commits.
// Purpose: Classify commit signatures when the forge reports nothing.
// Dependencies: std::process
// ============================================================================

//! ## Overview
//! When a commit carries no forge-side verification block, the supervisor
//! probes the local checkout with `git log --show-signature`. Outcomes fold
//! into the same two failure classes the signing gate understands: unsigned
//! (or bad) signatures and unverifiable ones (missing key, unknown output,
//! commit not present locally).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Command;

use crate::types::CommitSignature;

// ============================================================================
// SECTION: Probing
// ============================================================================

/// Fetches the pull request head ref into the local checkout, best effort.
pub fn fetch_pr_ref(pr_number: u64) {
    let candidates = [
        format!("refs/pull/{pr_number}/head"),
        format!("pull/{pr_number}/head"),
    ];
    for refspec in candidates {
        let fetched = Command::new("git")
            .args(["fetch", "--quiet", "origin", &refspec])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if fetched {
            return;
        }
    }
}

/// Probes one commit's signature via the local git checkout.
#[must_use]
pub fn local_signature_probe(sha: &str) -> CommitSignature {
    let exists = Command::new("git")
        .args(["cat-file", "-e", &format!("{sha}^{{commit}}")])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    if !exists {
        return CommitSignature {
            sha: sha.to_string(),
            verifiable: Some(false),
            verified: Some(false),
        };
    }

    let probe = Command::new("git")
        .args(["log", "--show-signature", "-n", "1", "--format=%H", sha])
        .output();
    let Ok(probe) = probe else {
        return CommitSignature {
            sha: sha.to_string(),
            verifiable: Some(false),
            verified: Some(false),
        };
    };
    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&probe.stdout),
        String::from_utf8_lossy(&probe.stderr)
    );

    if text.contains("Good \"git\" signature") || text.contains("Good signature") {
        return CommitSignature {
            sha: sha.to_string(),
            verifiable: Some(true),
            verified: Some(true),
        };
    }
    if text.contains("No signature")
        || text.contains("BAD signature")
        || text.contains("bad signature")
    {
        return CommitSignature {
            sha: sha.to_string(),
            verifiable: Some(true),
            verified: Some(false),
        };
    }
    // "Can't check signature" / "No public key" and anything unrecognized.
    CommitSignature {
        sha: sha.to_string(),
        verifiable: Some(false),
        verified: Some(false),
    }
}
