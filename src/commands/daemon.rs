use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use tracing::{error, info};

use crate::commands::sync::{short, sync_mirror};
use crate::config::{Config, SyncState};
use crate::error::{find_mirror_root, SyncError};

/// Execute the `diffsync daemon` command.
pub fn run(interval: u64) -> Result<(), SyncError> {
    let root = find_mirror_root()?;
    let config = Config::load(&root)?;

    let shutdown = Arc::new(AtomicBool::new(false));

    // Register signal handlers for SIGINT and SIGTERM
    for sig in &[signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(*sig, Arc::clone(&shutdown)).map_err(|e| {
            SyncError::Config(format!("failed to register signal handler: {e}"))
        })?;
    }

    println!("diffsync daemon started (polling every {interval}s)");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            println!("shutting down...");
            break;
        }

        // A failed cycle is retried on the next tick; the checkpoint only
        // moves past commits that were fully applied.
        if let Err(e) = sync_cycle(&root, &config) {
            error!("sync error: {e}");
            eprintln!("sync error: {e}");
        }

        // Sleep for the interval, checking shutdown periodically
        for _ in 0..interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            thread::sleep(Duration::from_secs(1));
        }
    }

    println!("daemon stopped");
    Ok(())
}

fn sync_cycle(root: &std::path::Path, config: &Config) -> Result<(), SyncError> {
    let mut state = SyncState::load(root)?;
    let (outcome, changes) = sync_mirror(root, config, &mut state)?;
    if let Some(head) = outcome.head {
        let (created, modified, deleted) = changes.summary();
        println!(
            "[{}] synced to {} ({} commit(s): {created} created, {modified} modified, {deleted} deleted)",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            short(&head),
            outcome.applied.len(),
        );
        info!(%head, applied = outcome.applied.len(), "sync cycle complete");
    }
    Ok(())
}
