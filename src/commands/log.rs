use crate::commands::open_engine;
use crate::commands::sync::short;
use crate::config::{Config, SyncState};
use crate::error::{find_mirror_root, SyncError};

/// List commits waiting to be replayed, oldest first.
pub fn run(since: Option<&str>) -> Result<(), SyncError> {
    let root = find_mirror_root()?;
    let config = Config::load(&root)?;
    let checkpoint = match since {
        Some(sha) => sha.to_string(),
        None => SyncState::load(&root)?.checkpoint,
    };

    let engine = open_engine(&root, &config)?;
    let mut commits = engine.commits_since(&checkpoint)?;
    commits.retain(|c| c.sha != checkpoint);
    commits.reverse();

    if commits.is_empty() {
        println!("Up to date at {}.", short(&checkpoint));
        return Ok(());
    }

    println!("{} pending commit(s) since {}:", commits.len(), short(&checkpoint));
    for commit in &commits {
        println!("  {} {}", short(&commit.sha), commit.summary());
    }
    Ok(())
}
