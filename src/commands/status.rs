use crate::config::{Config, SyncState};
use crate::error::{find_mirror_root, SyncError};

pub fn run() -> Result<(), SyncError> {
    let root = find_mirror_root()?;
    let config = Config::load(&root)?;
    let state = SyncState::load(&root)?;

    println!("=== Mirror ===");
    println!("  root:       {}", root.display());
    println!(
        "  remote:     {}/{} ({})",
        config.remote.owner, config.remote.repo, config.remote.api_url
    );
    println!("  paths:      {}", config.paths.encoding);
    let auth = if config.token().is_some() { "token" } else { "anonymous" };
    println!("  auth:       {auth} (${})", config.remote.token_env);

    println!();
    println!("=== Checkpoint ===");
    println!("  commit:     {}", state.checkpoint);
    match state.synced_at {
        Some(ref at) => println!("  synced at:  {at}"),
        None => println!("  synced at:  never"),
    }
    Ok(())
}
