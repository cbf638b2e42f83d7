use crate::codec::PathCodec;
use crate::config::Config;
use crate::error::{find_mirror_root, SyncError};

/// Codec configured for the enclosing mirror, or base62 outside one.
fn mirror_codec() -> Box<dyn PathCodec> {
    find_mirror_root()
        .and_then(|root| Config::load(&root))
        .map(|config| config.paths.encoding)
        .unwrap_or_default()
        .codec()
}

pub fn encode(path: &str) -> Result<(), SyncError> {
    println!("{}", mirror_codec().encode(path, "/"));
    Ok(())
}

pub fn decode(path: &str) -> Result<(), SyncError> {
    println!("{}", mirror_codec().decode(path, "/")?);
    Ok(())
}

