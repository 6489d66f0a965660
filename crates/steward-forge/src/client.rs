// crates/steward-forge/src/client.rs
// ============================================================================
// Module: Forge Client
// Description: Forge REST seam and its blocking HTTP implementation.
// Purpose: Consume the forge surface deterministically, failing closed.
// Dependencies: reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`ForgeApi`] is the seam between the control plane and the forge REST
//! host. The blocking [`HttpForge`] implementation normalizes the API base
//! to `/api/v1`, authenticates with a token header, and bounds every request
//! at five seconds. Responses expected to be lists must be lists, or the
//! call fails closed with a typed error; nothing is coerced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::signature::fetch_pr_ref;
use crate::signature::local_signature_probe;
use crate::types::CommitSignature;
use crate::types::CommitStatus;
use crate::types::Issue;
use crate::types::Label;
use crate::types::Milestone;
use crate::types::PrCommit;
use crate::types::PullFile;
use crate::types::PullRequest;
use crate::types::Review;
use crate::types::StatusState;
use crate::types::TimelineEvent;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Forge client errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; API failures carry the
///   endpoint label and HTTP status.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The API base was empty.
    #[error("forge api failure missing api_base")]
    MissingApiBase,
    /// The API base did not parse as a URL.
    #[error("forge api failure invalid api_base: {0}")]
    InvalidApiBase(String),
    /// Transport-level HTTP failure.
    #[error("forge http failure: {0}")]
    Http(String),
    /// An endpoint returned an unexpected shape or status.
    #[error("forge api failure endpoint={endpoint} status={status}")]
    ApiFailure {
        /// Endpoint label for diagnostics.
        endpoint: String,
        /// HTTP status observed.
        status: u16,
    },
    /// Status publication requires an Authorization token.
    #[error("forge status publish failed: missing authorization token")]
    MissingAuthorization,
    /// Status publication failed.
    #[error("forge status publish failed: status={status} sha={sha}")]
    StatusPublish {
        /// HTTP status observed.
        status: u16,
        /// Target commit SHA.
        sha: String,
    },
}

// ============================================================================
// SECTION: Forge Seam
// ============================================================================

/// Backend-agnostic forge surface consumed by the control plane.
///
/// Implementations must be deterministic and fail closed on missing or
/// malformed data.
pub trait ForgeApi {
    /// Resolves redirected owner/repo names to canonical values.
    fn resolve_repo(&self) -> (String, String);

    /// Lists issues in the given state (`open` or `all`).
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn list_issues(&self, state: &str) -> Result<Vec<Issue>, ForgeError>;

    /// Returns the timeline of an issue, for claim-age computation.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn issue_timeline(&self, number: u64) -> Result<Vec<TimelineEvent>, ForgeError>;

    /// Lists repository labels.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn list_labels(&self) -> Result<Vec<Label>, ForgeError>;

    /// Creates a repository label.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when creation fails.
    fn create_label(
        &self,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<Label, ForgeError>;

    /// Lists the labels attached to an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn issue_labels(&self, number: u64) -> Result<Vec<Label>, ForgeError>;

    /// Attaches a label to an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when attachment fails.
    fn add_label(&self, number: u64, label_id: i64) -> Result<(), ForgeError>;

    /// Removes a label from an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when removal fails.
    fn remove_label(&self, number: u64, label_id: i64) -> Result<(), ForgeError>;

    /// Posts a comment on an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the comment cannot be created.
    fn post_comment(&self, number: u64, body: &str) -> Result<(), ForgeError>;

    /// Closes an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the state change fails.
    fn close_issue(&self, number: u64) -> Result<(), ForgeError>;

    /// Creates an issue, used by autonomy-mode task generation.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when creation fails.
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[i64],
        milestone: Option<i64>,
    ) -> Result<Issue, ForgeError>;

    /// Lists milestones in all states.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn list_milestones(&self) -> Result<Vec<Milestone>, ForgeError>;

    /// Lists open pull requests, ascending by number.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError>;

    /// Lists the changed file names of a pull request, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn pull_files(&self, number: u64) -> Result<Vec<String>, ForgeError>;

    /// Lists the reviews of a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn pull_reviews(&self, number: u64) -> Result<Vec<Review>, ForgeError>;

    /// Lists the commits of a pull request with normalized signature state.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails, is not a list, or is
    /// empty.
    fn pull_commits(&self, number: u64) -> Result<Vec<CommitSignature>, ForgeError>;

    /// Lists the statuses recorded for a commit SHA.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the endpoint fails or is not a list.
    fn commit_statuses(&self, sha: &str) -> Result<Vec<CommitStatus>, ForgeError>;

    /// Publishes a governance status for a commit SHA.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when authentication is missing or the forge
    /// rejects the status.
    fn publish_status(
        &self,
        sha: &str,
        state: StatusState,
        context: &str,
        description: &str,
    ) -> Result<(), ForgeError>;
}

// ============================================================================
// SECTION: API Base Normalization
// ============================================================================

/// Normalizes an API base to end in `/api/v1` exactly once.
///
/// # Errors
///
/// Returns [`ForgeError::MissingApiBase`] for empty input.
pub fn normalize_api_base(api_base: &str) -> Result<String, ForgeError> {
    let base = api_base.trim_end_matches('/');
    if base.is_empty() {
        return Err(ForgeError::MissingApiBase);
    }
    if base.ends_with("/api/v1") {
        return Ok(base.to_string());
    }
    if let Some((prefix, _)) = base.split_once("/api/v1") {
        return Ok(format!("{prefix}/api/v1"));
    }
    Ok(format!("{base}/api/v1"))
}

// ============================================================================
// SECTION: HTTP Implementation
// ============================================================================

/// Request timeout applied to every forge call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum status description length accepted by the forge.
const STATUS_DESCRIPTION_LIMIT: usize = 140;

/// Blocking HTTP implementation of [`ForgeApi`].
///
/// # Invariants
/// - Every request carries `Accept: application/json` and times out at
///   [`REQUEST_TIMEOUT`].
/// - List-shaped endpoints fail closed when the payload is not a list.
#[derive(Debug, Clone)]
pub struct HttpForge {
    /// Shared blocking client.
    client: Client,
    /// Normalized API base ending in `/api/v1`.
    api_base: String,
    /// Repository owner.
    owner: String,
    /// Repository name.
    repo: String,
    /// Optional bearer token.
    token: Option<String>,
}

impl HttpForge {
    /// Builds a forge client against a normalized API base.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] when the base is empty, unparsable, or the
    /// HTTP client cannot be constructed.
    pub fn new(
        api_base: &str,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ForgeError> {
        let api_base = normalize_api_base(api_base)?;
        Url::parse(&api_base).map_err(|err| ForgeError::InvalidApiBase(err.to_string()))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ForgeError::Http(err.to_string()))?;
        Ok(Self {
            client,
            api_base,
            owner: owner.into(),
            repo: repo.into(),
            token,
        })
    }

    /// Returns the repository path prefix for endpoint construction.
    fn repo_path(&self) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo)
    }

    /// Issues one JSON request and returns the status with the parsed body.
    fn request_json(
        &self,
        method: reqwest::Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<(u16, Option<Value>), ForgeError> {
        let mut request = self.client.request(method, url).header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        let response = request.send().map_err(|err| ForgeError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|err| ForgeError::Http(err.to_string()))?;
        let parsed = if text.is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&text).ok()
        };
        Ok((status, parsed))
    }

    /// Fetches a list endpoint and decodes each element, failing closed on
    /// any non-list payload.
    fn get_list<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        endpoint: &str,
    ) -> Result<Vec<T>, ForgeError> {
        let (status, body) = self.request_json(reqwest::Method::GET, url, None)?;
        let Some(Value::Array(items)) = body else {
            return Err(ForgeError::ApiFailure {
                endpoint: endpoint.to_string(),
                status,
            });
        };
        if status != 200 {
            return Err(ForgeError::ApiFailure {
                endpoint: endpoint.to_string(),
                status,
            });
        }
        let mut decoded = Vec::with_capacity(items.len());
        for item in items {
            let value = serde_json::from_value(item).map_err(|_| ForgeError::ApiFailure {
                endpoint: endpoint.to_string(),
                status,
            })?;
            decoded.push(value);
        }
        Ok(decoded)
    }

    /// Requires a mutation response status in the accepted set.
    fn require_status(
        status: u16,
        accepted: &[u16],
        endpoint: &str,
    ) -> Result<(), ForgeError> {
        if accepted.contains(&status) {
            return Ok(());
        }
        Err(ForgeError::ApiFailure {
            endpoint: endpoint.to_string(),
            status,
        })
    }
}

impl ForgeApi for HttpForge {
    fn resolve_repo(&self) -> (String, String) {
        let url = self.repo_path();
        match self.request_json(reqwest::Method::GET, &url, None) {
            Ok((200, Some(body))) => {
                let owner = body
                    .get("owner")
                    .and_then(|owner| owner.get("login"))
                    .and_then(Value::as_str)
                    .unwrap_or(&self.owner)
                    .to_string();
                let repo =
                    body.get("name").and_then(Value::as_str).unwrap_or(&self.repo).to_string();
                (owner, repo)
            }
            _ => (self.owner.clone(), self.repo.clone()),
        }
    }

    fn list_issues(&self, state: &str) -> Result<Vec<Issue>, ForgeError> {
        let url = format!("{}/issues?state={state}&limit=300", self.repo_path());
        self.get_list(&url, "issues")
    }

    fn issue_timeline(&self, number: u64) -> Result<Vec<TimelineEvent>, ForgeError> {
        let url = format!("{}/issues/{number}/timeline", self.repo_path());
        self.get_list(&url, &format!("issues/{number}/timeline"))
    }

    fn list_labels(&self) -> Result<Vec<Label>, ForgeError> {
        let url = format!("{}/labels", self.repo_path());
        self.get_list(&url, "labels")
    }

    fn create_label(
        &self,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<Label, ForgeError> {
        let url = format!("{}/labels", self.repo_path());
        let payload = json!({ "name": name, "color": color, "description": description });
        let (status, body) =
            self.request_json(reqwest::Method::POST, &url, Some(&payload))?;
        if !(status == 200 || status == 201) {
            return Err(ForgeError::ApiFailure {
                endpoint: "labels".to_string(),
                status,
            });
        }
        body.and_then(|value| serde_json::from_value(value).ok()).ok_or(ForgeError::ApiFailure {
            endpoint: "labels".to_string(),
            status,
        })
    }

    fn issue_labels(&self, number: u64) -> Result<Vec<Label>, ForgeError> {
        let url = format!("{}/issues/{number}/labels", self.repo_path());
        self.get_list(&url, &format!("issues/{number}/labels"))
    }

    fn add_label(&self, number: u64, label_id: i64) -> Result<(), ForgeError> {
        let url = format!("{}/issues/{number}/labels", self.repo_path());
        let payload = json!({ "labels": [label_id] });
        let (status, _) = self.request_json(reqwest::Method::POST, &url, Some(&payload))?;
        Self::require_status(status, &[200, 201], &format!("issues/{number}/labels"))
    }

    fn remove_label(&self, number: u64, label_id: i64) -> Result<(), ForgeError> {
        let url = format!("{}/issues/{number}/labels/{label_id}", self.repo_path());
        let (status, _) = self.request_json(reqwest::Method::DELETE, &url, None)?;
        Self::require_status(status, &[200, 204], &format!("issues/{number}/labels/{label_id}"))
    }

    fn post_comment(&self, number: u64, body: &str) -> Result<(), ForgeError> {
        let url = format!("{}/issues/{number}/comments", self.repo_path());
        let payload = json!({ "body": body });
        let (status, _) = self.request_json(reqwest::Method::POST, &url, Some(&payload))?;
        Self::require_status(status, &[200, 201], &format!("issues/{number}/comments"))
    }

    fn close_issue(&self, number: u64) -> Result<(), ForgeError> {
        let url = format!("{}/issues/{number}", self.repo_path());
        let payload = json!({ "state": "closed" });
        let (status, _) = self.request_json(reqwest::Method::PATCH, &url, Some(&payload))?;
        Self::require_status(status, &[200, 201], &format!("issues/{number}"))
    }

    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[i64],
        milestone: Option<i64>,
    ) -> Result<Issue, ForgeError> {
        let url = format!("{}/issues", self.repo_path());
        let mut payload = json!({ "title": title, "body": body, "labels": labels });
        if let Some(milestone) = milestone
            && let Some(map) = payload.as_object_mut()
        {
            map.insert("milestone".to_string(), json!(milestone));
        }
        let (status, body) = self.request_json(reqwest::Method::POST, &url, Some(&payload))?;
        if !(status == 200 || status == 201) {
            return Err(ForgeError::ApiFailure {
                endpoint: "issues".to_string(),
                status,
            });
        }
        body.and_then(|value| serde_json::from_value(value).ok()).ok_or(ForgeError::ApiFailure {
            endpoint: "issues".to_string(),
            status,
        })
    }

    fn list_milestones(&self) -> Result<Vec<Milestone>, ForgeError> {
        let url = format!("{}/milestones?state=all", self.repo_path());
        self.get_list(&url, "milestones")
    }

    fn open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError> {
        let url = format!("{}/pulls?state=open&limit=300", self.repo_path());
        let mut pulls: Vec<PullRequest> = self.get_list(&url, "pulls")?;
        pulls.sort_by_key(|pull| pull.number);
        Ok(pulls)
    }

    fn pull_files(&self, number: u64) -> Result<Vec<String>, ForgeError> {
        let url = format!("{}/pulls/{number}/files", self.repo_path());
        let entries: Vec<PullFile> = self.get_list(&url, &format!("pulls/{number}/files"))?;
        let mut names: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.filename.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        Ok(names)
    }

    fn pull_reviews(&self, number: u64) -> Result<Vec<Review>, ForgeError> {
        let url = format!("{}/pulls/{number}/reviews", self.repo_path());
        self.get_list(&url, &format!("pulls/{number}/reviews"))
    }

    fn pull_commits(&self, number: u64) -> Result<Vec<CommitSignature>, ForgeError> {
        let url = format!("{}/pulls/{number}/commits", self.repo_path());
        let endpoint = format!("pulls/{number}/commits");
        let commits: Vec<PrCommit> = self.get_list(&url, &endpoint)?;
        if commits.is_empty() {
            return Err(ForgeError::ApiFailure {
                endpoint,
                status: 200,
            });
        }
        fetch_pr_ref(number);
        let mut normalized = Vec::with_capacity(commits.len());
        for commit in commits {
            let verification = commit
                .verification
                .or_else(|| commit.commit.and_then(|detail| detail.verification));
            let signature = verification.map_or_else(
                || local_signature_probe(&commit.sha),
                |verification| CommitSignature {
                    sha: commit.sha.clone(),
                    verifiable: Some(true),
                    verified: Some(verification.verified),
                },
            );
            normalized.push(signature);
        }
        Ok(normalized)
    }

    fn commit_statuses(&self, sha: &str) -> Result<Vec<CommitStatus>, ForgeError> {
        let url = format!("{}/commits/{sha}/statuses", self.repo_path());
        self.get_list(&url, &format!("commits/{sha}/statuses"))
    }

    fn publish_status(
        &self,
        sha: &str,
        state: StatusState,
        context: &str,
        description: &str,
    ) -> Result<(), ForgeError> {
        if self.token.is_none() {
            return Err(ForgeError::MissingAuthorization);
        }
        let truncated: String = description.chars().take(STATUS_DESCRIPTION_LIMIT).collect();
        let url = format!("{}/statuses/{sha}", self.repo_path());
        let payload = json!({
            "state": state.as_str(),
            "context": context,
            "description": truncated,
        });
        let (status, _) = self.request_json(reqwest::Method::POST, &url, Some(&payload))?;
        if status == 200 || status == 201 {
            return Ok(());
        }
        Err(ForgeError::StatusPublish {
            status,
            sha: sha.to_string(),
        })
    }
}
