pub mod apply;
pub mod codec;
pub mod daemon;
pub mod init;
pub mod log;
pub mod status;
pub mod sync;

use std::path::Path;

use crate::changes::ChangeSets;
use crate::config::Config;
use crate::error::SyncError;
use crate::remote::GitHubClient;
use crate::replay::ReplicationEngine;

/// Build a replay engine for the mirror at `root` from its config.
pub fn open_engine(
    root: &Path,
    config: &Config,
) -> Result<ReplicationEngine<GitHubClient>, SyncError> {
    let client = GitHubClient::from_config(config)?;
    Ok(ReplicationEngine::new(
        client,
        config.walk.strategy.walker(),
        config.paths.encoding.codec(),
        root,
        config.walk.max_hops,
    ))
}

/// Print touched files relative to the mirror root, git-status style.
pub fn print_changes(root: &Path, changes: &ChangeSets) {
    let rel = |p: &Path| {
        p.strip_prefix(root)
            .unwrap_or(p)
            .display()
            .to_string()
    };

    for path in changes.created() {
        println!("  A {}", rel(path));
    }
    for path in changes.modified() {
        if !changes.created().contains(path) {
            println!("  M {}", rel(path));
        }
    }
    for path in changes.deleted() {
        println!("  D {}", rel(path));
    }

    let (created, modified, deleted) = changes.summary();
    println!("{created} created, {modified} modified, {deleted} deleted");
}
