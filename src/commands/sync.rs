use std::path::Path;

use crate::changes::ChangeSets;
use crate::commands::{open_engine, print_changes};
use crate::config::{Config, SyncState};
use crate::error::{find_mirror_root, SyncError};
use crate::replay::ReplayOutcome;

pub fn run(since: Option<&str>) -> Result<(), SyncError> {
    let root = find_mirror_root()?;
    let config = Config::load(&root)?;
    let mut state = SyncState::load(&root)?;
    if let Some(sha) = since {
        state.checkpoint = sha.to_string();
    }

    let before = state.checkpoint.clone();
    let (outcome, changes) = sync_mirror(&root, &config, &mut state)?;

    match outcome.head {
        None => println!("Already up to date at {}.", short(&before)),
        Some(head) => {
            println!(
                "Replayed {} commit(s): {} -> {}",
                outcome.applied.len(),
                short(&before),
                short(&head)
            );
            print_changes(&root, &changes);
        }
    }
    Ok(())
}

/// Replay from `state.checkpoint` to the remote head, saving the checkpoint
/// after every applied commit.
pub fn sync_mirror(
    root: &Path,
    config: &Config,
    state: &mut SyncState,
) -> Result<(ReplayOutcome, ChangeSets), SyncError> {
    let mut engine = open_engine(root, config)?;
    let checkpoint = state.checkpoint.clone();
    let outcome = engine.replay_with(&checkpoint, |commit| {
        state.advance(&commit.sha);
        state.save(root)
    })?;
    Ok((outcome, engine.changes().clone()))
}

pub fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
