use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Files touched during a replay session, keyed by local path.
///
/// Append-only: a path created and later deleted stays in both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSets {
    created: BTreeSet<PathBuf>,
    deleted: BTreeSet<PathBuf>,
    modified: BTreeSet<PathBuf>,
}

impl ChangeSets {
    pub fn created(&self) -> &BTreeSet<PathBuf> {
        &self.created
    }

    pub fn deleted(&self) -> &BTreeSet<PathBuf> {
        &self.deleted
    }

    pub fn modified(&self) -> &BTreeSet<PathBuf> {
        &self.modified
    }

    pub(crate) fn record_created(&mut self, path: &Path) {
        self.created.insert(path.to_path_buf());
    }

    pub(crate) fn record_deleted(&mut self, path: &Path) {
        self.deleted.insert(path.to_path_buf());
    }

    pub(crate) fn record_modified(&mut self, path: &Path) {
        self.modified.insert(path.to_path_buf());
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    pub fn merge(&mut self, other: ChangeSets) {
        self.created.extend(other.created);
        self.deleted.extend(other.deleted);
        self.modified.extend(other.modified);
    }

    /// (created, modified, deleted) counts.
    pub fn summary(&self) -> (usize, usize, usize) {
        (self.created.len(), self.modified.len(), self.deleted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_semantics() {
        let mut changes = ChangeSets::default();
        changes.record_modified(Path::new("/m/a.txt"));
        changes.record_modified(Path::new("/m/a.txt"));
        changes.record_created(Path::new("/m/a.txt"));
        assert_eq!(changes.modified().len(), 1);
        assert_eq!(changes.summary(), (1, 1, 0));
    }

    #[test]
    fn test_created_then_deleted_stays_in_both() {
        let mut changes = ChangeSets::default();
        changes.record_created(Path::new("/m/tmp.txt"));
        changes.record_deleted(Path::new("/m/tmp.txt"));
        assert!(changes.created().contains(Path::new("/m/tmp.txt")));
        assert!(changes.deleted().contains(Path::new("/m/tmp.txt")));
    }

    #[test]
    fn test_merge() {
        let mut a = ChangeSets::default();
        a.record_created(Path::new("/m/x"));
        let mut b = ChangeSets::default();
        b.record_deleted(Path::new("/m/y"));
        a.merge(b);
        assert_eq!(a.summary(), (1, 0, 1));
        assert!(!a.is_empty());
        assert!(ChangeSets::default().is_empty());
    }
}
