use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SyncError;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";

/// A single commit as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub parent_shas: Vec<String>,
}

impl Commit {
    pub fn first_parent(&self) -> Option<&str> {
        self.parent_shas.first().map(String::as_str)
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

// Wire shape of `/repos/{owner}/{repo}/commits/{sha}`.
#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    commit: CommitDetail,
    #[serde(default)]
    parents: Vec<ParentRef>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ParentRef {
    sha: String,
}

impl From<CommitPayload> for Commit {
    fn from(payload: CommitPayload) -> Self {
        Commit {
            sha: payload.sha,
            message: payload.commit.message,
            parent_shas: payload.parents.into_iter().map(|p| p.sha).collect(),
        }
    }
}

/// Anything that can hand out commits and their diffs.
pub trait CommitSource {
    fn fetch_head(&self) -> Result<Commit, SyncError>;
    fn fetch_commit(&self, sha: &str) -> Result<Commit, SyncError>;
    /// Raw unified diff for one commit, exactly as served.
    fn fetch_diff(&self, sha: &str) -> Result<Vec<u8>, SyncError>;
}

impl<T: CommitSource + ?Sized> CommitSource for &T {
    fn fetch_head(&self) -> Result<Commit, SyncError> {
        (**self).fetch_head()
    }

    fn fetch_commit(&self, sha: &str) -> Result<Commit, SyncError> {
        (**self).fetch_commit(sha)
    }

    fn fetch_diff(&self, sha: &str) -> Result<Vec<u8>, SyncError> {
        (**self).fetch_diff(sha)
    }
}

/// Retry behaviour for metadata requests.
///
/// The default never gives up and never sleeps: a background mirror would
/// rather spin until the API answers with something parseable.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

/// Call `fetch` until its body deserializes into `T`.
///
/// Transport failures, 5xx/429 responses and unparseable bodies count as a
/// failed attempt. Any other error is returned at once.
pub fn retry_until_parsed<T, F>(policy: &RetryPolicy, mut fetch: F) -> Result<T, SyncError>
where
    T: DeserializeOwned,
    F: FnMut() -> Result<String, SyncError>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        let failure = match fetch() {
            Ok(body) => match serde_json::from_str::<T>(&body) {
                Ok(value) => return Ok(value),
                Err(e) => format!("unparseable body: {e}"),
            },
            Err(e) if e.is_transient() => e.to_string(),
            Err(e) => return Err(e),
        };

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(SyncError::RetriesExhausted {
                    attempts,
                    last: failure,
                });
            }
        }
        warn!(attempt = attempts, "metadata fetch failed, retrying: {failure}");
        if !policy.delay.is_zero() {
            thread::sleep(policy.delay);
        }
    }
}

/// `CommitSource` backed by the GitHub-style REST API.
pub struct GitHubClient {
    http: Client,
    base: String,
    token: Option<String>,
    user_agent: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(
        api_url: &str,
        owner: &str,
        repo: &str,
        token: Option<String>,
    ) -> Result<Self, SyncError> {
        let http = Client::builder()
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base: format!("{}/repos/{}/{}", api_url.trim_end_matches('/'), owner, repo),
            token,
            user_agent: concat!("diffsync/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let mut client = Self::new(
            &config.remote.api_url,
            &config.remote.owner,
            &config.remote.repo,
            config.token(),
        )?;
        client.user_agent = config.remote.user_agent.clone();
        client.retry = config.retry.policy();
        Ok(client)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn get(&self, url: &str, accept: &str) -> Result<reqwest::blocking::Response, SyncError> {
        let mut request = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, accept);
        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request
            .send()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SyncError::RemoteStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    fn get_text(&self, url: &str, accept: &str) -> Result<String, SyncError> {
        debug!(%url, "GET");
        self.get(url, accept)?
            .text()
            .map_err(|e| SyncError::Transport(e.to_string()))
    }
}

impl CommitSource for GitHubClient {
    fn fetch_head(&self) -> Result<Commit, SyncError> {
        let url = format!("{}/commits?per_page=1", self.base);
        let mut commits: Vec<CommitPayload> =
            retry_until_parsed(&self.retry, || self.get_text(&url, JSON_MEDIA_TYPE))?;
        if commits.is_empty() {
            return Err(SyncError::EmptyRepository);
        }
        Ok(commits.swap_remove(0).into())
    }

    fn fetch_commit(&self, sha: &str) -> Result<Commit, SyncError> {
        let url = format!("{}/commits/{}", self.base, sha);
        let payload: CommitPayload =
            retry_until_parsed(&self.retry, || self.get_text(&url, JSON_MEDIA_TYPE))?;
        Ok(payload.into())
    }

    fn fetch_diff(&self, sha: &str) -> Result<Vec<u8>, SyncError> {
        let url = format!("{}/commits/{}", self.base, sha);
        debug!(%url, "GET diff");
        let body = self
            .get(&url, DIFF_MEDIA_TYPE)?
            .bytes()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(body.to_vec())
    }
}
