use std::path::Path;

use crate::config::{Config, PathEncoding, SyncState, STATE_DIR};
use crate::error::SyncError;

pub struct InitOptions<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub checkpoint: &'a str,
    pub api_url: Option<&'a str>,
    pub token_env: Option<&'a str>,
    pub plain_paths: bool,
}

pub fn run(opts: &InitOptions<'_>) -> Result<(), SyncError> {
    let root = std::env::current_dir()?;
    init_mirror(&root, opts)?;
    println!("Initialized mirror of {}/{} in {}", opts.owner, opts.repo, root.display());
    println!("Run `diffsync sync` to replay commits after {}.", opts.checkpoint);
    Ok(())
}

/// Write a fresh `.diffsync/` under `root`.
pub fn init_mirror(root: &Path, opts: &InitOptions<'_>) -> Result<(), SyncError> {
    if root.join(STATE_DIR).join("config.yml").exists() {
        return Err(SyncError::Config(format!(
            "{} is already a diffsync mirror",
            root.display()
        )));
    }
    if opts.checkpoint.trim().is_empty() {
        return Err(SyncError::Config("checkpoint sha must not be empty".into()));
    }

    let mut config = Config::new(opts.owner, opts.repo);
    if let Some(url) = opts.api_url {
        config.remote.api_url = url.to_string();
    }
    if let Some(var) = opts.token_env {
        config.remote.token_env = var.to_string();
    }
    if opts.plain_paths {
        config.paths.encoding = PathEncoding::Plain;
    }

    config.save(root)?;
    SyncState::new(opts.checkpoint.trim()).save(root)?;
    Ok(())
}
