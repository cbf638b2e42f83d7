use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::error::SyncError;
use crate::remote::{Commit, CommitSource};

/// Strategy for collecting the commits between `head` and `target`.
///
/// Implementations return commits newest-first and include the commit whose
/// sha equals `target` as the final element.
pub trait AncestryWalk {
    fn walk(
        &self,
        source: &dyn CommitSource,
        head: Commit,
        target: &str,
        max_hops: usize,
    ) -> Result<Vec<Commit>, SyncError>;
}

/// Follows `parent_shas[0]` only. Assumes linear history.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstParentWalk;

/// Breadth-first over every parent, not expanding past the target.
///
/// Only commits that descend from the target are returned, ordered so that
/// every commit comes before its parents. Handles checkpoints reachable only
/// through a merge parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeAwareWalk;

impl AncestryWalk for FirstParentWalk {
    fn walk(
        &self,
        source: &dyn CommitSource,
        head: Commit,
        target: &str,
        max_hops: usize,
    ) -> Result<Vec<Commit>, SyncError> {
        let not_found = |hops| SyncError::CheckpointNotFound {
            target: target.to_string(),
            hops,
        };

        let mut commits = Vec::new();
        let mut current = head;
        loop {
            let parent = current
                .first_parent()
                .map(str::to_string)
                .ok_or_else(|| not_found(commits.len() + 1))?;
            commits.push(current);
            if commits.len() > max_hops {
                return Err(not_found(commits.len()));
            }

            current = source.fetch_commit(&parent)?;
            debug!(sha = %current.sha, "walked to parent");
            if current.sha == target {
                commits.push(current);
                return Ok(commits);
            }
        }
    }
}

impl AncestryWalk for MergeAwareWalk {
    fn walk(
        &self,
        source: &dyn CommitSource,
        head: Commit,
        target: &str,
        max_hops: usize,
    ) -> Result<Vec<Commit>, SyncError> {
        let head_sha = head.sha.clone();
        let mut visited: HashMap<String, Commit> = HashMap::new();
        let mut queued: HashSet<String> = HashSet::from([head_sha.clone()]);
        let mut queue = VecDeque::from([head]);
        let mut found = false;

        // Explore every parent line except the target's own history.
        while let Some(commit) = queue.pop_front() {
            if visited.len() >= max_hops {
                if !found {
                    return Err(SyncError::CheckpointNotFound {
                        target: target.to_string(),
                        hops: visited.len(),
                    });
                }
                warn!(max_hops, "merge-aware walk truncated; side branches left unexplored");
                break;
            }
            if commit.sha == target {
                found = true;
                visited.insert(commit.sha.clone(), commit);
                continue;
            }

            for sha in &commit.parent_shas {
                if queued.insert(sha.clone()) {
                    let parent = source.fetch_commit(sha)?;
                    debug!(sha = %parent.sha, "walked to parent");
                    queue.push_back(parent);
                }
            }
            visited.insert(commit.sha.clone(), commit);
        }

        if !found {
            return Err(SyncError::CheckpointNotFound {
                target: target.to_string(),
                hops: visited.len(),
            });
        }

        let keep = descendants_of(target, &visited);
        Ok(newest_first(&head_sha, &keep, &mut visited))
    }
}

/// `target` plus every visited commit that has it as an ancestor.
fn descendants_of(target: &str, visited: &HashMap<String, Commit>) -> HashSet<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for commit in visited.values() {
        for parent in &commit.parent_shas {
            children
                .entry(parent.as_str())
                .or_default()
                .push(commit.sha.as_str());
        }
    }

    let mut keep = HashSet::from([target.to_string()]);
    let mut stack = vec![target];
    while let Some(sha) = stack.pop() {
        for &child in children.get(sha).into_iter().flatten() {
            if keep.insert(child.to_string()) {
                stack.push(child);
            }
        }
    }
    keep
}

/// Children before parents, starting at `head`; ends with the target.
fn newest_first(
    head: &str,
    keep: &HashSet<String>,
    visited: &mut HashMap<String, Commit>,
) -> Vec<Commit> {
    // Iterative post-order over kept parents yields oldest-first.
    let mut order: Vec<String> = Vec::new();
    let mut entered: HashSet<String> = HashSet::new();
    let mut stack = vec![(head.to_string(), false)];
    while let Some((sha, finished)) = stack.pop() {
        if finished {
            order.push(sha);
            continue;
        }
        if !entered.insert(sha.clone()) {
            continue;
        }
        let parents = visited
            .get(&sha)
            .map(|c| c.parent_shas.clone())
            .unwrap_or_default();
        stack.push((sha, true));
        for parent in parents.into_iter().rev() {
            if keep.contains(&parent) && !entered.contains(&parent) {
                stack.push((parent, false));
            }
        }
    }

    order
        .into_iter()
        .rev()
        .filter_map(|sha| visited.remove(&sha))
        .collect()
}

/// Commits from the remote head back to `target`, newest-first.
///
/// Returns an empty list when the head already is `target`.
pub fn commits_since(
    source: &dyn CommitSource,
    walk: &dyn AncestryWalk,
    target: &str,
    max_hops: usize,
) -> Result<Vec<Commit>, SyncError> {
    let head = source.fetch_head()?;
    if head.sha == target {
        return Ok(Vec::new());
    }
    walk.walk(source, head, target, max_hops)
}
