use std::fs;
use std::path::Path;

use crate::commands::print_changes;
use crate::config::Config;
use crate::diff_apply;
use crate::error::{find_mirror_root, SyncError};

/// Apply a unified diff file to the mirror. The checkpoint is left alone.
pub fn run(diff_file: &Path) -> Result<(), SyncError> {
    let root = find_mirror_root()?;
    let config = Config::load(&root)?;

    let diff = fs::read(diff_file).map_err(|e| {
        SyncError::Config(format!("failed to read {}: {}", diff_file.display(), e))
    })?;
    if diff.iter().all(u8::is_ascii_whitespace) {
        println!("No changes to apply.");
        return Ok(());
    }

    let codec = config.paths.encoding.codec();
    let changes = diff_apply::apply_diff(&diff, &root, codec.as_ref())?;
    eprintln!("Applied {}", diff_file.display());
    print_changes(&root, &changes);
    Ok(())
}
