pub mod changes;
pub mod codec;
pub mod commands;
pub mod config;
pub mod diff_apply;
pub mod error;
pub mod history;
pub mod remote;
pub mod replay;
pub mod telemetry;

pub use changes::ChangeSets;
pub use codec::{Base62Codec, PathCodec, PlainCodec};
pub use error::SyncError;
pub use remote::{Commit, CommitSource, GitHubClient};
pub use replay::{ReplayOutcome, ReplicationEngine};
