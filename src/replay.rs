use std::path::{Path, PathBuf};

use tracing::info;

use crate::changes::ChangeSets;
use crate::codec::PathCodec;
use crate::diff_apply;
use crate::error::SyncError;
use crate::history::{self, AncestryWalk};
use crate::remote::{Commit, CommitSource};

/// Result of bringing the mirror up to the remote head.
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    /// Shas whose diffs were applied, oldest first.
    pub applied: Vec<String>,
    /// Remote head after the replay; `None` when already up to date.
    pub head: Option<String>,
}

/// One replay session against a single mirror.
///
/// Owns the mirror for its lifetime; callers must not run two engines on the
/// same root at once.
pub struct ReplicationEngine<S> {
    source: S,
    walk: Box<dyn AncestryWalk>,
    codec: Box<dyn PathCodec>,
    root: PathBuf,
    max_hops: usize,
    changes: ChangeSets,
}

impl<S: CommitSource> ReplicationEngine<S> {
    pub fn new(
        source: S,
        walk: Box<dyn AncestryWalk>,
        codec: Box<dyn PathCodec>,
        root: &Path,
        max_hops: usize,
    ) -> Self {
        Self {
            source,
            walk,
            codec,
            root: root.to_path_buf(),
            max_hops,
            changes: ChangeSets::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files touched so far in this session.
    pub fn changes(&self) -> &ChangeSets {
        &self.changes
    }

    /// Commits between `target` and the remote head, newest-first, ending
    /// with the commit whose sha is `target`.
    pub fn commits_since(&self, target: &str) -> Result<Vec<Commit>, SyncError> {
        history::commits_since(&self.source, self.walk.as_ref(), target, self.max_hops)
    }

    /// Apply one diff to the mirror.
    pub fn apply_diff(&mut self, diff: &[u8]) -> Result<&ChangeSets, SyncError> {
        diff_apply::apply_diff_into(diff, &self.root, self.codec.as_ref(), &mut self.changes)?;
        Ok(&self.changes)
    }

    /// Bring the mirror from `checkpoint` up to the remote head.
    ///
    /// Diffs are applied oldest-first. The checkpoint commit itself is
    /// already reflected in the mirror and is skipped. A failure leaves
    /// earlier commits applied.
    pub fn replay(&mut self, checkpoint: &str) -> Result<ReplayOutcome, SyncError> {
        self.replay_with(checkpoint, |_| Ok(()))
    }

    /// Like [`replay`](Self::replay), calling `on_applied` after each commit
    /// so the caller can persist progress.
    pub fn replay_with<F>(
        &mut self,
        checkpoint: &str,
        mut on_applied: F,
    ) -> Result<ReplayOutcome, SyncError>
    where
        F: FnMut(&Commit) -> Result<(), SyncError>,
    {
        let mut commits = self.commits_since(checkpoint)?;
        let Some(head) = commits.first().map(|c| c.sha.clone()) else {
            info!(%checkpoint, "mirror already at remote head");
            return Ok(ReplayOutcome::default());
        };
        commits.reverse();

        let mut applied = Vec::new();
        for commit in commits.iter().filter(|c| c.sha != checkpoint) {
            let diff = self.source.fetch_diff(&commit.sha)?;
            self.apply_diff(&diff)?;
            info!(sha = %commit.sha, summary = commit.summary(), "applied commit");
            on_applied(commit)?;
            applied.push(commit.sha.clone());
        }

        Ok(ReplayOutcome {
            applied,
            head: Some(head),
        })
    }
}
