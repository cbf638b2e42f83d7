use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::codec::{Base62Codec, PathCodec, PlainCodec};
use crate::error::SyncError;
use crate::history::{AncestryWalk, FirstParentWalk, MergeAwareWalk};
use crate::remote::RetryPolicy;

pub const STATE_DIR: &str = ".diffsync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub walk: WalkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    #[serde(default)]
    pub encoding: PathEncoding,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PathEncoding {
    #[default]
    Base62,
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetryConfig {
    /// `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    #[serde(default)]
    pub strategy: WalkStrategy,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WalkStrategy {
    #[default]
    FirstParent,
    MergeAware,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_user_agent() -> String {
    concat!("diffsync/", env!("CARGO_PKG_VERSION")).into()
}
fn default_max_hops() -> usize {
    10_000
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            strategy: WalkStrategy::default(),
            max_hops: default_max_hops(),
        }
    }
}

impl std::fmt::Display for PathEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathEncoding::Base62 => write!(f, "base62"),
            PathEncoding::Plain => write!(f, "plain"),
        }
    }
}

impl PathEncoding {
    pub fn codec(&self) -> Box<dyn PathCodec> {
        match self {
            PathEncoding::Base62 => Box::new(Base62Codec),
            PathEncoding::Plain => Box::new(PlainCodec),
        }
    }
}

impl WalkStrategy {
    pub fn walker(&self) -> Box<dyn AncestryWalk> {
        match self {
            WalkStrategy::FirstParent => Box::new(FirstParentWalk),
            WalkStrategy::MergeAware => Box::new(MergeAwareWalk),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

impl Config {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            remote: RemoteConfig {
                api_url: default_api_url(),
                owner: owner.to_string(),
                repo: repo.to_string(),
                token_env: default_token_env(),
                user_agent: default_user_agent(),
            },
            paths: PathsConfig::default(),
            retry: RetryConfig::default(),
            walk: WalkConfig::default(),
        }
    }

    /// Load config from `.diffsync/config.yml` relative to the mirror root.
    pub fn load(mirror_root: &Path) -> Result<Self, SyncError> {
        let path = mirror_root.join(STATE_DIR).join("config.yml");
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        if config.remote.owner.is_empty() || config.remote.repo.is_empty() {
            return Err(SyncError::Config(
                "remote.owner and remote.repo must be set".into(),
            ));
        }
        Ok(config)
    }

    /// Write config to `.diffsync/config.yml`.
    pub fn save(&self, mirror_root: &Path) -> Result<(), SyncError> {
        let dir = mirror_root.join(STATE_DIR);
        std::fs::create_dir_all(&dir)?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(dir.join("config.yml"), content)?;
        Ok(())
    }

    /// Bearer token from the configured environment variable, if set.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.remote.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

/// The last commit known to be reflected in the mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncState {
    pub checkpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<String>,
}

impl SyncState {
    pub fn new(checkpoint: &str) -> Self {
        Self {
            checkpoint: checkpoint.to_string(),
            synced_at: None,
        }
    }

    pub fn load(mirror_root: &Path) -> Result<Self, SyncError> {
        let path = mirror_root.join(STATE_DIR).join("state.yml");
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, mirror_root: &Path) -> Result<(), SyncError> {
        let dir = mirror_root.join(STATE_DIR);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("state.yml"), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Move the checkpoint forward and stamp the time.
    pub fn advance(&mut self, sha: &str) {
        self.checkpoint = sha.to_string();
        self.synced_at = Some(
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = "remote:\n  owner: acme\n  repo: mirror\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.remote.api_url, "https://api.github.com");
        assert_eq!(config.remote.token_env, "GITHUB_TOKEN");
        assert_eq!(config.paths.encoding, PathEncoding::Base62);
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.retry.delay_ms, 0);
        assert_eq!(config.walk.strategy, WalkStrategy::FirstParent);
        assert_eq!(config.walk.max_hops, 10_000);
    }

    #[test]
    fn test_kebab_case_enums() {
        let yaml = "\
remote:
  owner: acme
  repo: mirror
paths:
  encoding: plain
walk:
  strategy: merge-aware
  max_hops: 5
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.paths.encoding, PathEncoding::Plain);
        assert_eq!(config.walk.strategy, WalkStrategy::MergeAware);
        assert_eq!(config.walk.max_hops, 5);
    }

    #[test]
    fn test_load_rejects_missing_repo() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join(STATE_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.yml"), "remote:\n  owner: acme\n  repo: ''\n").unwrap();
        assert!(matches!(Config::load(tmp.path()), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_state_advance_stamps_time() {
        let mut state = SyncState::new("abc");
        assert!(state.synced_at.is_none());
        state.advance("def");
        assert_eq!(state.checkpoint, "def");
        assert!(state.synced_at.unwrap().ends_with('Z'));
    }
}
