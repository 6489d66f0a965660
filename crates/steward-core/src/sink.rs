// crates/steward-core/src/sink.rs
// ============================================================================
// Module: Audit Artifact Sink
// Description: Append-only per-stream artifact files with replay loading.
// Purpose: Persist audit events write-once and verify them on load.
// Dependencies: crate::{audit, canon, hashing}, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit artifacts live at `audit/streams/<stream_id>/<sequence>.audit.json`,
//! one canonical-JSON file per sequence, contiguous from 0. Every write is an
//! exclusive create; a pre-existing path raises the kill-switch
//! `secure_layer.killswitch.audit_append_violation`, which the controller
//! must treat as fatal. Loading recomputes every event hash and compares it
//! with the stored value before the chain itself is verified.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::audit::AuditError;
use crate::audit::AuditEvent;
use crate::audit::ChainError;
use crate::audit::event_fingerprint;
use crate::audit::validate_audit_event;
use crate::audit::verify_audit_chain;
use crate::canon::CanonError;
use crate::canon::CanonMap;
use crate::canon::CanonValue;
use crate::canon::canonical_map_bytes;
use crate::hashing::HashError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Stream directory root, relative to the repository root.
const STREAM_ROOT: &str = "audit/streams";

/// Artifact file suffix.
const ARTIFACT_SUFFIX: &str = ".audit.json";

/// Artifact schema version.
const ARTIFACT_VERSION: i64 = 1;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact sink and replay errors.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
/// - [`SinkError::AppendViolation`] is the only kill-switch variant.
#[derive(Debug, Error)]
pub enum SinkError {
    /// An artifact path already existed; the stream was about to be rewritten.
    #[error("secure_layer.killswitch.audit_append_violation path={path}")]
    AppendViolation {
        /// Repository-relative artifact path.
        path: String,
    },
    /// The writer identity was empty.
    #[error("secure_layer.audit.invalid written_by")]
    EmptyWrittenBy,
    /// The stream directory does not exist.
    #[error("secure_layer.replay.invalid stream_missing")]
    StreamMissing,
    /// A stream file name did not parse as a sequence number.
    #[error("secure_layer.replay.invalid sequence_file")]
    SequenceFile,
    /// Stream sequences were not contiguous from 0.
    #[error("secure_layer.replay.invalid missing_sequence")]
    MissingSequence,
    /// A stored artifact did not contain a well-formed event.
    #[error("secure_layer.replay.invalid event_payload")]
    EventPayload,
    /// A stored event hash did not match the recomputed fingerprint.
    #[error("secure_layer.replay.invalid event_hash_mismatch sequence={sequence}")]
    EventHashMismatch {
        /// Sequence of the offending artifact.
        sequence: u64,
    },
    /// Filesystem operation failed.
    #[error("secure_layer.audit.io {0}")]
    Io(String),
    /// Event validation failed.
    #[error(transparent)]
    Audit(#[from] AuditError),
    /// Chain verification failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Canonical rendering failed.
    #[error(transparent)]
    Canon(#[from] CanonError),
}

impl SinkError {
    /// Returns true when the error must terminate the controller.
    #[must_use]
    pub const fn is_kill_switch(&self) -> bool {
        matches!(self, Self::AppendViolation { .. })
    }
}

// ============================================================================
// SECTION: Artifact Construction
// ============================================================================

/// Builds the repository-relative artifact path for a stream position.
///
/// # Errors
///
/// Returns [`SinkError::Audit`] when the stream identifier is empty.
pub fn build_audit_artifact_path(stream_id: &str, sequence: u64) -> Result<String, SinkError> {
    if stream_id.is_empty() {
        return Err(SinkError::Audit(AuditError::EmptyStreamId));
    }
    Ok(format!("{STREAM_ROOT}/{stream_id}/{sequence}{ARTIFACT_SUFFIX}"))
}

/// Builds the canonical artifact bytes for one event.
///
/// # Errors
///
/// Returns [`SinkError`] when the writer identity is empty, the event is
/// invalid, or canonical rendering fails.
pub fn build_audit_artifact_bytes(
    event: &AuditEvent,
    written_by: &str,
) -> Result<Vec<u8>, SinkError> {
    if written_by.is_empty() {
        return Err(SinkError::EmptyWrittenBy);
    }
    validate_audit_event(event)?;
    let sequence = i64::try_from(event.sequence)
        .map_err(|_| SinkError::Audit(AuditError::NonContiguousSequence))?;

    let mut event_map = CanonMap::new();
    event_map.insert("event_id".to_string(), CanonValue::from(event.event_id.as_str()));
    event_map.insert("event_type".to_string(), CanonValue::from(event.event_type.as_str()));
    event_map.insert("policy_hash".to_string(), CanonValue::from(event.policy_hash.as_str()));
    event_map.insert(
        "request_fingerprint".to_string(),
        CanonValue::from(event.request_fingerprint.as_str()),
    );
    event_map.insert("sequence".to_string(), CanonValue::Int(sequence));
    event_map.insert("stream_id".to_string(), CanonValue::from(event.stream_id.as_str()));
    event_map
        .insert("prev_event_hash".to_string(), CanonValue::from(event.prev_event_hash.as_str()));
    event_map.insert("payload".to_string(), CanonValue::Map(event.payload.clone()));

    let mut artifact = CanonMap::new();
    artifact.insert("event".to_string(), CanonValue::Map(event_map));
    artifact.insert("event_hash".to_string(), CanonValue::from(event_fingerprint(event)?));
    artifact.insert("written_by".to_string(), CanonValue::from(written_by));
    artifact.insert("version".to_string(), CanonValue::Int(ARTIFACT_VERSION));
    Ok(canonical_map_bytes(&artifact)?)
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Append-only artifact writer seam.
pub trait AuditArtifactWriter {
    /// Writes one event artifact and returns its repository-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::AppendViolation`] when the target path already
    /// exists, or any construction/IO error otherwise.
    fn write_event(&self, event: &AuditEvent) -> Result<String, SinkError>;
}

/// Filesystem artifact writer rooted at a repository checkout.
///
/// # Invariants
/// - Every write is an exclusive create; existing artifacts are never
///   touched.
#[derive(Debug, Clone)]
pub struct RepoAuditWriter {
    /// Repository root under which stream directories live.
    repo_root: PathBuf,
    /// Writer identity recorded in every artifact.
    written_by: String,
}

impl RepoAuditWriter {
    /// Creates a writer rooted at the given repository path.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>, written_by: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            written_by: written_by.into(),
        }
    }
}

impl AuditArtifactWriter for RepoAuditWriter {
    fn write_event(&self, event: &AuditEvent) -> Result<String, SinkError> {
        let rel_path = build_audit_artifact_path(&event.stream_id, event.sequence)?;
        let full_path = self.repo_root.join(&rel_path);
        let bytes = build_audit_artifact_bytes(event, &self.written_by)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|err| SinkError::Io(err.to_string()))?;
        }
        match fs::File::create_new(&full_path) {
            Ok(mut file) => {
                file.write_all(&bytes).map_err(|err| SinkError::Io(err.to_string()))?;
                Ok(rel_path)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(SinkError::AppendViolation {
                path: rel_path,
            }),
            Err(err) => Err(SinkError::Io(err.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Stream Loading
// ============================================================================

/// Stored artifact shape on disk.
#[derive(Debug, Serialize, Deserialize)]
struct StoredArtifact {
    /// The persisted audit event.
    event: AuditEvent,
    /// Event hash recorded at write time.
    event_hash: String,
    /// Writer identity recorded at write time.
    #[serde(default)]
    written_by: String,
    /// Artifact schema version.
    #[serde(default)]
    version: i64,
}

/// Loads a stream from disk, verifying stored hashes against recomputed
/// fingerprints.
///
/// Sequences must be contiguous from 0. Returns event/stored-hash pairs in
/// sequence order; a missing stream directory is an error, while an empty
/// directory loads as an empty stream.
///
/// # Errors
///
/// Returns [`SinkError`] on missing streams, malformed file names, sequence
/// gaps, unparsable artifacts, or hash mismatches.
pub fn load_audit_stream(
    repo_root: &Path,
    stream_id: &str,
) -> Result<Vec<(AuditEvent, String)>, SinkError> {
    if stream_id.is_empty() {
        return Err(SinkError::Audit(AuditError::EmptyStreamId));
    }
    let stream_dir = repo_root.join(STREAM_ROOT).join(stream_id);
    if !stream_dir.is_dir() {
        return Err(SinkError::StreamMissing);
    }

    let mut entries: Vec<(u64, PathBuf)> = Vec::new();
    let listing = fs::read_dir(&stream_dir).map_err(|err| SinkError::Io(err.to_string()))?;
    for entry in listing {
        let entry = entry.map_err(|err| SinkError::Io(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(ARTIFACT_SUFFIX) else {
            continue;
        };
        let sequence = stem.parse::<u64>().map_err(|_| SinkError::SequenceFile)?;
        entries.push((sequence, path));
    }

    entries.sort_by_key(|(sequence, _)| *sequence);
    let mut loaded = Vec::with_capacity(entries.len());
    let mut expected = 0u64;
    for (sequence, path) in entries {
        if sequence != expected {
            return Err(SinkError::MissingSequence);
        }
        expected += 1;
        let bytes = fs::read(&path).map_err(|err| SinkError::Io(err.to_string()))?;
        let artifact: StoredArtifact =
            serde_json::from_slice(&bytes).map_err(|_| SinkError::EventPayload)?;
        if artifact.version != ARTIFACT_VERSION || artifact.written_by.is_empty() {
            return Err(SinkError::EventPayload);
        }
        let computed = event_fingerprint(&artifact.event)?;
        if artifact.event_hash != computed {
            return Err(SinkError::EventHashMismatch {
                sequence,
            });
        }
        loaded.push((artifact.event, artifact.event_hash));
    }
    Ok(loaded)
}

/// Loads a stream and verifies the full audit chain.
///
/// # Errors
///
/// Returns [`SinkError`] for load failures and chain violations alike.
pub fn verify_audit_stream(repo_root: &Path, stream_id: &str) -> Result<usize, SinkError> {
    let loaded = load_audit_stream(repo_root, stream_id)?;
    let events: Vec<AuditEvent> = loaded.into_iter().map(|(event, _)| event).collect();
    verify_audit_chain(&events, stream_id)?;
    Ok(events.len())
}

/// Returns the next append position for a stream: the current length and
/// the fingerprint of the last event (empty for a fresh stream).
///
/// A missing stream directory is treated as a fresh stream.
///
/// # Errors
///
/// Returns [`SinkError`] when an existing stream fails to load or verify.
pub fn next_stream_position(
    repo_root: &Path,
    stream_id: &str,
) -> Result<(u64, String), SinkError> {
    if stream_id.is_empty() {
        return Err(SinkError::Audit(AuditError::EmptyStreamId));
    }
    let stream_dir = repo_root.join(STREAM_ROOT).join(stream_id);
    if !stream_dir.is_dir() {
        return Ok((0, String::new()));
    }
    let loaded = load_audit_stream(repo_root, stream_id)?;
    let length = u64::try_from(loaded.len()).map_err(|err| SinkError::Io(err.to_string()))?;
    let last_hash = loaded.last().map_or_else(String::new, |(_, hash)| hash.clone());
    Ok((length, last_hash))
}
