use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::changes::ChangeSets;
use crate::codec::PathCodec;
use crate::config::STATE_DIR;
use crate::error::SyncError;

/// Terminator written after every flushed line.
pub const LINE_ENDING: &[u8] = if cfg!(windows) { b"\r\n" } else { b"\n" };

const NULL_DEVICE: &[u8] = b"/dev/null";

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Parsed `@@ -a,b +c,d @@` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    /// Starting line in the old file (1-based, 0 for new files).
    pub old_start: usize,
    pub old_count: usize,
    /// Starting line in the new file (1-based, 0 for deleted files).
    pub new_start: usize,
    pub new_count: usize,
}

/// What a single diff line means to the applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEvent<'a> {
    /// `diff --git a/<p> b/<p>`; carries everything after `diff --git `.
    FileHeader(&'a [u8]),
    NewFile,
    DeletedFile,
    RenameFrom(&'a [u8]),
    RenameTo(&'a [u8]),
    /// `--- <p>`; carries the path part.
    OldFileMarker(&'a [u8]),
    NewFileMarker,
    Binary,
    Hunk(HunkHeader),
    Add(&'a [u8]),
    /// A bare `+` with nothing after it.
    AppendEmpty,
    Remove(&'a [u8]),
    Context,
    /// `\ No newline at end of file`
    NoNewline,
    Ignored,
}

/// Classify one diff line given the current per-file state.
///
/// While a hunk still expects lines (per its header counts) every line is a
/// body line, so removed `-- x` or added `++ x` content is never mistaken
/// for a file marker.
pub fn classify<'a>(line: &'a [u8], state: &FileEditState) -> Result<DiffEvent<'a>, SyncError> {
    if state.in_hunk && state.hunk_open() {
        return Ok(body_event(line));
    }

    if let Some(rest) = line.strip_prefix(b"diff --git ") {
        return Ok(DiffEvent::FileHeader(rest));
    }
    if line.starts_with(b"new file mode") {
        return Ok(DiffEvent::NewFile);
    }
    if line.starts_with(b"deleted file mode") {
        return Ok(DiffEvent::DeletedFile);
    }
    if let Some(path) = line.strip_prefix(b"rename from ") {
        return Ok(DiffEvent::RenameFrom(path));
    }
    if let Some(path) = line.strip_prefix(b"rename to ") {
        return Ok(DiffEvent::RenameTo(path));
    }
    if let Some(path) = line.strip_prefix(b"--- ") {
        return Ok(DiffEvent::OldFileMarker(path));
    }
    if line.starts_with(b"+++ ") {
        return Ok(DiffEvent::NewFileMarker);
    }
    if line.starts_with(b"Binary files ") || line == b"GIT binary patch" {
        return Ok(DiffEvent::Binary);
    }
    if line.starts_with(b"@@ ") {
        return Ok(DiffEvent::Hunk(parse_hunk_header(line)?));
    }
    if state.in_hunk {
        return Ok(body_event(line));
    }
    Ok(DiffEvent::Ignored)
}

fn body_event(line: &[u8]) -> DiffEvent<'_> {
    match line.split_first() {
        Some((b'+', rest)) if rest.is_empty() => DiffEvent::AppendEmpty,
        Some((b'+', rest)) => DiffEvent::Add(rest),
        Some((b'-', rest)) => DiffEvent::Remove(rest),
        Some((b'\\', _)) => DiffEvent::NoNewline,
        _ => DiffEvent::Context,
    }
}

/// Parse "@@ -old_start,old_count +new_start,new_count @@" header.
pub fn parse_hunk_header(header: &[u8]) -> Result<HunkHeader, SyncError> {
    let invalid = || {
        SyncError::DiffParse(format!(
            "invalid hunk header: {}",
            String::from_utf8_lossy(header)
        ))
    };

    // Format: @@ -A,B +C,D @@ [section]  (or @@ -A +C @@ for single-line)
    let body = header.strip_prefix(b"@@ ").ok_or_else(invalid)?;
    let end = body
        .windows(3)
        .position(|w| w == b" @@")
        .ok_or_else(invalid)?;
    let ranges = std::str::from_utf8(&body[..end]).map_err(|_| invalid())?;

    let parts: Vec<&str> = ranges.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(invalid());
    }

    let (old_start, old_count) = parse_range(parts[0].strip_prefix('-').ok_or_else(invalid)?)?;
    let (new_start, new_count) = parse_range(parts[1].strip_prefix('+').ok_or_else(invalid)?)?;

    Ok(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

fn parse_range(s: &str) -> Result<(usize, usize), SyncError> {
    let number = |n: &str| {
        n.parse::<usize>()
            .map_err(|_| SyncError::DiffParse(format!("invalid range: {s}")))
    };
    match s.split_once(',') {
        Some((start, count)) => Ok((number(start)?, number(count)?)),
        None => Ok((number(s)?, 1)),
    }
}

/// Extract the new-side path from the text after `diff --git `.
///
/// Splits on `" b/"`. When the path itself contains that sequence the split
/// whose halves agree wins; failing that, the first split is taken. Quoted
/// paths are not unescaped.
pub fn header_path(rest: &[u8]) -> Result<&[u8], SyncError> {
    let splits: Vec<usize> = rest
        .windows(3)
        .enumerate()
        .filter(|(_, w)| *w == b" b/")
        .map(|(i, _)| i)
        .collect();

    let old_side = |at: usize| {
        let left = &rest[..at];
        left.strip_prefix(b"a/").unwrap_or(left)
    };

    let at = match splits.as_slice() {
        [] => {
            return Err(SyncError::DiffParse(format!(
                "no b/ path in header: diff --git {}",
                String::from_utf8_lossy(rest)
            )))
        }
        [only] => *only,
        [first, ..] => splits
            .iter()
            .copied()
            .find(|&at| old_side(at) == &rest[at + 3..])
            .unwrap_or(*first),
    };
    Ok(&rest[at + 3..])
}

// ---------------------------------------------------------------------------
// Per-file edit state
// ---------------------------------------------------------------------------

/// Working state for the file currently being patched.
#[derive(Debug, Default)]
pub struct FileEditState {
    /// Absolute path under the mirror root; `None` before the first header.
    pub path: Option<PathBuf>,
    pub lines: Vec<Vec<u8>>,
    pub is_new: bool,
    pub is_deleted: bool,
    /// Carries a binary patch; content is never rewritten.
    pub is_binary: bool,
    /// On-disk content has been read into `lines`.
    pub loaded: bool,
    pub in_hunk: bool,
    /// 1-based position of the next line to touch.
    pub cursor: usize,
    rename_from: Option<PathBuf>,
    old_remaining: usize,
    new_remaining: usize,
}

impl FileEditState {
    pub fn for_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }

    /// Start from existing content, as if it had been read at `---`.
    pub fn with_lines(path: PathBuf, lines: Vec<Vec<u8>>) -> Self {
        Self {
            path: Some(path),
            lines,
            loaded: true,
            ..Self::default()
        }
    }

    fn hunk_open(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    pub fn start_hunk(&mut self, header: HunkHeader) {
        self.in_hunk = true;
        self.cursor = if header.new_start == 0 {
            header.old_start
        } else {
            header.new_start
        };
        self.old_remaining = header.old_count;
        self.new_remaining = header.new_count;
    }

    /// Apply one hunk body event to the line buffer.
    pub fn apply_body_line(&mut self, event: &DiffEvent<'_>) -> Result<(), SyncError> {
        match event {
            DiffEvent::Add(_) | DiffEvent::AppendEmpty => {
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            DiffEvent::Remove(_) => {
                self.old_remaining = self.old_remaining.saturating_sub(1);
            }
            DiffEvent::Context => {
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            _ => {}
        }

        // The file is already gone; its hunks only describe removed content.
        if self.is_deleted {
            return Ok(());
        }

        match event {
            DiffEvent::Add(text) => {
                let at = self.edit_index(self.lines.len())?;
                self.lines.insert(at, text.to_vec());
                self.cursor += 1;
            }
            DiffEvent::AppendEmpty => {
                self.lines.push(Vec::new());
                self.cursor += 1;
            }
            DiffEvent::Remove(_) => {
                let last = self.lines.len().checked_sub(1);
                let at = match last {
                    Some(last) => self.edit_index(last)?,
                    None => return Err(self.out_of_range()),
                };
                self.lines.remove(at);
            }
            DiffEvent::Context => {
                self.cursor += 1;
            }
            _ => {}
        }
        Ok(())
    }

    /// `cursor - 1`, provided it does not exceed `max`.
    fn edit_index(&self, max: usize) -> Result<usize, SyncError> {
        match self.cursor.checked_sub(1) {
            Some(at) if at <= max => Ok(at),
            _ => Err(self.out_of_range()),
        }
    }

    fn out_of_range(&self) -> SyncError {
        SyncError::HunkOutOfRange {
            path: self.path.clone().unwrap_or_default(),
            line: self.cursor,
            len: self.lines.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Line IO
// ---------------------------------------------------------------------------

/// Split raw bytes into lines on `\n`, dropping one trailing `\r` per line.
///
/// A final terminator does not produce an extra empty line.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    let body = data.strip_suffix(b"\n").unwrap_or(data);
    body.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

fn read_lines(path: &Path) -> Result<Vec<Vec<u8>>, SyncError> {
    let data = fs::read(path)?;
    Ok(split_lines(&data).into_iter().map(<[u8]>::to_vec).collect())
}

fn write_lines(path: &Path, lines: &[Vec<u8>]) -> Result<(), SyncError> {
    let mut out = Vec::with_capacity(lines.iter().map(|l| l.len() + LINE_ENDING.len()).sum());
    for line in lines {
        out.extend_from_slice(line);
        out.extend_from_slice(LINE_ENDING);
    }
    fs::write(path, out)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Apply logic
// ---------------------------------------------------------------------------

/// Drives diff lines through `FileEditState` and mirrors the result on disk.
pub struct Patcher<'a> {
    root: &'a Path,
    codec: &'a dyn PathCodec,
    changes: &'a mut ChangeSets,
    state: FileEditState,
}

impl<'a> Patcher<'a> {
    pub fn new(root: &'a Path, codec: &'a dyn PathCodec, changes: &'a mut ChangeSets) -> Self {
        Self {
            root,
            codec,
            changes,
            state: FileEditState::default(),
        }
    }

    /// Feed one diff line (without its terminator).
    pub fn feed(&mut self, line: &[u8]) -> Result<(), SyncError> {
        let event = classify(line, &self.state)?;
        match event {
            DiffEvent::FileHeader(rest) => {
                self.flush()?;
                let path = self.resolve(header_path(rest)?)?;
                self.state = FileEditState::for_path(path);
            }
            DiffEvent::NewFile => self.state.is_new = true,
            DiffEvent::DeletedFile => self.delete_current()?,
            DiffEvent::RenameFrom(from) => {
                self.state.rename_from = Some(self.resolve(from)?);
            }
            DiffEvent::RenameTo(to) => {
                let to = self.resolve(to)?;
                if let Some(from) = self.state.rename_from.take() {
                    self.rename(&from, &to)?;
                }
                self.state.path = Some(to);
            }
            DiffEvent::OldFileMarker(old) => {
                if !self.state.is_new && !self.state.is_deleted && old != NULL_DEVICE {
                    if let Some(ref path) = self.state.path {
                        self.state.lines = read_lines(path)?;
                        self.state.loaded = true;
                    }
                }
            }
            DiffEvent::Hunk(header) => self.state.start_hunk(header),
            DiffEvent::Binary => {
                warn!(path = ?self.state.path, "binary patch skipped");
                self.state.is_binary = true;
            }
            DiffEvent::Add(_)
            | DiffEvent::AppendEmpty
            | DiffEvent::Remove(_)
            | DiffEvent::Context
            | DiffEvent::NoNewline => self.state.apply_body_line(&event)?,
            DiffEvent::NewFileMarker | DiffEvent::Ignored => {}
        }
        Ok(())
    }

    /// Flush the last file.
    pub fn finish(mut self) -> Result<(), SyncError> {
        self.flush()
    }

    fn flush(&mut self) -> Result<(), SyncError> {
        let state = std::mem::take(&mut self.state);
        let Some(path) = state.path else {
            return Ok(());
        };
        // Mode-only changes never load content; leave them be.
        if state.is_deleted || state.is_binary || !(state.is_new || state.loaded) {
            return Ok(());
        }

        if state.is_new {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::File::create(&path)?;
        }
        write_lines(&path, &state.lines)?;
        debug!(path = %path.display(), lines = state.lines.len(), "flushed");

        self.changes.record_modified(&path);
        if state.is_new {
            self.changes.record_created(&path);
        }
        Ok(())
    }

    fn delete_current(&mut self) -> Result<(), SyncError> {
        let Some(path) = self.state.path.clone() else {
            return Ok(());
        };
        fs::remove_file(&path)?;
        self.changes.record_deleted(&path);
        debug!(path = %path.display(), "deleted");

        if let Some(parent) = path.parent() {
            if parent != self.root && fs::read_dir(parent)?.next().is_none() {
                fs::remove_dir(parent)?;
                debug!(dir = %parent.display(), "removed empty directory");
            }
        }
        self.state.is_deleted = true;
        Ok(())
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<(), SyncError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)?;
        self.changes.record_deleted(from);
        self.changes.record_created(to);
        self.changes.record_modified(to);
        debug!(from = %from.display(), to = %to.display(), "renamed");
        Ok(())
    }

    /// Decode a diff path and anchor it under the mirror root.
    fn resolve(&self, encoded: &[u8]) -> Result<PathBuf, SyncError> {
        let encoded = std::str::from_utf8(encoded).map_err(|e| SyncError::PathDecode {
            segment: String::from_utf8_lossy(encoded).into_owned(),
            reason: e.to_string(),
        })?;
        let decoded = self.codec.decode(encoded, "/")?;

        let rel = Path::new(&decoded);
        let mut components = rel.components();
        let first = components.next();
        let safe = matches!(first, Some(Component::Normal(name)) if name != OsStr::new(STATE_DIR))
            && components.all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(SyncError::UnsafePath(decoded));
        }
        Ok(self.root.join(rel))
    }
}

/// Apply one commit's diff to the mirror at `root`, recording into `changes`.
pub fn apply_diff_into(
    diff: &[u8],
    root: &Path,
    codec: &dyn PathCodec,
    changes: &mut ChangeSets,
) -> Result<(), SyncError> {
    let mut patcher = Patcher::new(root, codec, changes);
    for line in split_lines(diff) {
        patcher.feed(line)?;
    }
    patcher.finish()
}

/// Apply one diff and return the files it touched.
pub fn apply_diff(
    diff: &[u8],
    root: &Path,
    codec: &dyn PathCodec,
) -> Result<ChangeSets, SyncError> {
    let mut changes = ChangeSets::default();
    apply_diff_into(diff, root, codec, &mut changes)?;
    Ok(changes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Base62Codec, PlainCodec};

    fn state_with(lines: &[&str]) -> FileEditState {
        FileEditState::with_lines(
            PathBuf::from("f.txt"),
            lines.iter().map(|l| l.as_bytes().to_vec()).collect(),
        )
    }

    fn run(state: &mut FileEditState, diff_lines: &[&str]) -> Result<(), SyncError> {
        for line in diff_lines {
            match classify(line.as_bytes(), state)? {
                DiffEvent::Hunk(h) => state.start_hunk(h),
                event => state.apply_body_line(&event)?,
            }
        }
        Ok(())
    }

    fn text(state: &FileEditState) -> Vec<String> {
        state
            .lines
            .iter()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    fn read_text(path: &Path) -> Vec<String> {
        let data = fs::read(path).unwrap();
        split_lines(&data)
            .into_iter()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    #[test]
    fn test_parse_hunk_header_basic() {
        let h = parse_hunk_header(b"@@ -1,5 +1,7 @@").unwrap();
        assert_eq!((h.old_start, h.old_count, h.new_start, h.new_count), (1, 5, 1, 7));
    }

    #[test]
    fn test_parse_hunk_header_single_line_with_section() {
        let h = parse_hunk_header(b"@@ -3 +4 @@ fn main() {").unwrap();
        assert_eq!((h.old_start, h.old_count, h.new_start, h.new_count), (3, 1, 4, 1));
    }

    #[test]
    fn test_parse_hunk_header_invalid() {
        assert!(parse_hunk_header(b"@@ -x,1 +1 @@").is_err());
        assert!(parse_hunk_header(b"@@ -1,1").is_err());
    }

    #[test]
    fn test_header_path_simple() {
        assert_eq!(header_path(b"a/src/x.rs b/src/x.rs").unwrap(), b"src/x.rs");
    }

    #[test]
    fn test_header_path_prefers_matching_split() {
        let rest = b"a/dir b/file b/dir b/file";
        assert_eq!(header_path(rest).unwrap(), b"dir b/file");
    }

    #[test]
    fn test_header_path_falls_back_to_first_split() {
        let rest = b"a/x b/y b/z";
        assert_eq!(header_path(rest).unwrap(), b"y b/z");
        assert!(header_path(b"a/nothing-here").is_err());
    }

    #[test]
    fn test_split_lines() {
        assert!(split_lines(b"").is_empty());
        assert_eq!(split_lines(b"a\nb\n"), vec![&b"a"[..], b"b"]);
        assert_eq!(split_lines(b"a\nb"), vec![&b"a"[..], b"b"]);
        assert_eq!(split_lines(b"a\r\n\n"), vec![&b"a"[..], b""]);
    }

    #[test]
    fn test_replace_middle_line() {
        let mut state = state_with(&["one", "two", "three"]);
        run(&mut state, &["@@ -1,3 +1,3 @@", " one", "-two", "+TWO", " three"]).unwrap();
        assert_eq!(text(&state), vec!["one", "TWO", "three"]);
    }

    #[test]
    fn test_hunks_apply_in_file_order() {
        let original = ["a", "b", "c", "d", "e", "f"];
        // First hunk adds a line after "a"; the second hunk's new-side start
        // already accounts for it.
        let hunk1 = ["@@ -1,2 +1,3 @@", " a", "+a2", " b"];
        let hunk2 = ["@@ -5,2 +6,2 @@", "-e", "+E", " f"];

        let mut forward = state_with(&original);
        run(&mut forward, &hunk1).unwrap();
        run(&mut forward, &hunk2).unwrap();
        assert_eq!(text(&forward), vec!["a", "a2", "b", "c", "d", "E", "f"]);

        let mut reversed = state_with(&original);
        run(&mut reversed, &hunk2).unwrap();
        run(&mut reversed, &hunk1).unwrap();
        assert_ne!(text(&reversed), text(&forward));
    }

    #[test]
    fn test_bare_plus_appends_at_end() {
        let mut state = state_with(&["one", "two", "three"]);
        run(&mut state, &["@@ -1,2 +1,3 @@", " one", "+", " two"]).unwrap();
        // Not inserted after "one": the empty line lands at the end.
        assert_eq!(text(&state), vec!["one", "two", "three", ""]);
    }

    #[test]
    fn test_zero_new_start_uses_old_start() {
        let mut state = state_with(&["x", "y"]);
        run(&mut state, &["@@ -2,1 +0,0 @@", "-y"]).unwrap();
        assert_eq!(text(&state), vec!["x"]);
    }

    #[test]
    fn test_marker_lookalikes_inside_hunk_are_body() {
        let mut state = state_with(&["-- a", "keep"]);
        run(&mut state, &["@@ -1,2 +1,2 @@", "--- a", "+++ b", " keep"]).unwrap();
        assert_eq!(text(&state), vec!["++ b", "keep"]);
    }

    #[test]
    fn test_no_newline_marker_does_not_move_cursor() {
        let mut state = state_with(&["a", "old"]);
        run(
            &mut state,
            &[
                "@@ -1,2 +1,2 @@",
                " a",
                "-old",
                "\\ No newline at end of file",
                "+new",
                "\\ No newline at end of file",
            ],
        )
        .unwrap();
        assert_eq!(text(&state), vec!["a", "new"]);
    }

    #[test]
    fn test_out_of_range_remove_is_an_error() {
        let mut state = state_with(&["only"]);
        let err = run(&mut state, &["@@ -5,1 +5,0 @@", "-gone"]).unwrap_err();
        assert!(matches!(err, SyncError::HunkOutOfRange { line: 5, len: 1, .. }));
    }

    #[test]
    fn test_deleted_state_ignores_body() {
        let mut state = state_with(&[]);
        state.is_deleted = true;
        run(&mut state, &["@@ -1,2 +0,0 @@", "-a", "-b"]).unwrap();
        assert!(state.lines.is_empty());
    }

    #[test]
    fn test_apply_modify_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.txt"), "one\ntwo\nthree\n").unwrap();

        let diff = "\
diff --git a/src/a.txt b/src/a.txt
index 1111111..2222222 100644
--- a/src/a.txt
+++ b/src/a.txt
@@ -1,3 +1,3 @@
 one
-two
+TWO
 three
";
        let changes = apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert_eq!(read_text(&root.join("src/a.txt")), vec!["one", "TWO", "three"]);
        assert!(changes.modified().contains(&root.join("src/a.txt")));
        assert!(changes.created().is_empty());
    }

    #[test]
    fn test_apply_new_file_with_encoded_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        let encoded = Base62Codec.encode("docs/notes.md", "/");

        let diff = format!(
            "diff --git a/{encoded} b/{encoded}\n\
             new file mode 100644\n\
             index 0000000..3333333\n\
             --- /dev/null\n\
             +++ b/{encoded}\n\
             @@ -0,0 +1,2 @@\n\
             +hello\n\
             +world\n"
        );
        let changes = apply_diff(diff.as_bytes(), root, &Base62Codec).unwrap();

        let path = root.join("docs/notes.md");
        assert_eq!(read_text(&path), vec!["hello", "world"]);
        assert!(changes.created().contains(&path));
        assert!(changes.modified().contains(&path));
    }

    #[test]
    fn test_apply_empty_new_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        let diff = "\
diff --git a/empty.txt b/empty.txt
new file mode 100644
index 0000000..e69de29
";
        apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert_eq!(fs::read(root.join("empty.txt")).unwrap(), b"");
    }

    #[test]
    fn test_apply_delete_removes_empty_parent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("old")).unwrap();
        fs::write(root.join("old/gone.txt"), "bye\n").unwrap();
        fs::write(root.join("top.txt"), "stay\n").unwrap();

        let diff = "\
diff --git a/old/gone.txt b/old/gone.txt
deleted file mode 100644
index 4444444..0000000
--- a/old/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";
        let changes = apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert!(!root.join("old/gone.txt").exists());
        assert!(!root.join("old").exists());
        assert!(root.join("top.txt").exists());
        assert!(changes.deleted().contains(&root.join("old/gone.txt")));
        assert!(changes.modified().is_empty());
    }

    #[test]
    fn test_apply_delete_keeps_root_and_busy_parent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("dir")).unwrap();
        fs::write(root.join("dir/a"), "a\n").unwrap();
        fs::write(root.join("dir/b"), "b\n").unwrap();
        fs::write(root.join("c"), "c\n").unwrap();

        let diff = "\
diff --git a/dir/a b/dir/a
deleted file mode 100644
--- a/dir/a
+++ /dev/null
@@ -1 +0,0 @@
-a
diff --git a/c b/c
deleted file mode 100644
--- a/c
+++ /dev/null
@@ -1 +0,0 @@
-c
";
        apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert!(root.join("dir/b").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_delete_missing_file_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let diff = "\
diff --git a/ghost b/ghost
deleted file mode 100644
";
        let err = apply_diff(diff.as_bytes(), tmp.path(), &PlainCodec).unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }

    #[test]
    fn test_mode_change_leaves_content_alone() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("run.sh"), "#!/bin/sh\n").unwrap();
        let diff = "\
diff --git a/run.sh b/run.sh
old mode 100644
new mode 100755
";
        let changes = apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert_eq!(fs::read_to_string(root.join("run.sh")).unwrap(), "#!/bin/sh\n");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_new_binary_file_is_not_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        let diff = "\
diff --git a/logo.png b/logo.png
new file mode 100644
index 0000000..3b18e51
Binary files /dev/null and b/logo.png differ
diff --git a/notes.txt b/notes.txt
new file mode 100644
--- /dev/null
+++ b/notes.txt
@@ -0,0 +1 @@
+hello
";
        let changes = apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert!(!root.join("logo.png").exists());
        assert!(!changes.created().contains(&root.join("logo.png")));
        assert!(!changes.modified().contains(&root.join("logo.png")));
        assert_eq!(read_text(&root.join("notes.txt")), vec!["hello"]);
    }

    #[test]
    fn test_rename_moves_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("before.txt"), "same\n").unwrap();
        let diff = "\
diff --git a/before.txt b/sub/after.txt
similarity index 100%
rename from before.txt
rename to sub/after.txt
";
        let changes = apply_diff(diff.as_bytes(), root, &PlainCodec).unwrap();
        assert!(!root.join("before.txt").exists());
        assert_eq!(read_text(&root.join("sub/after.txt")), vec!["same"]);
        assert!(changes.deleted().contains(&root.join("before.txt")));
        assert!(changes.created().contains(&root.join("sub/after.txt")));
    }

    #[test]
    fn test_rejects_paths_escaping_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let diff = "diff --git a/../evil b/../evil\nnew file mode 100644\n";
        let err = apply_diff(diff.as_bytes(), tmp.path(), &PlainCodec).unwrap_err();
        assert!(matches!(err, SyncError::UnsafePath(_)));

        let diff = "diff --git a/.diffsync/state.yml b/.diffsync/state.yml\n";
        let err = apply_diff(diff.as_bytes(), tmp.path(), &PlainCodec).unwrap_err();
        assert!(matches!(err, SyncError::UnsafePath(_)));
    }

    #[test]
    fn test_undecodable_path_aborts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let diff = "diff --git a/not-base62 b/not-base62\nnew file mode 100644\n";
        let err = apply_diff(diff.as_bytes(), tmp.path(), &Base62Codec).unwrap_err();
        assert!(matches!(err, SyncError::PathDecode { .. }));
    }

    #[test]
    fn test_non_utf8_content_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("latin1.txt"), b"caf\xe9\nkeep\n").unwrap();

        let diff = b"\
diff --git a/latin1.txt b/latin1.txt
--- a/latin1.txt
+++ b/latin1.txt
@@ -1,2 +1,2 @@
 caf\xe9
-keep
+na\xefve
";
        apply_diff(diff, root, &PlainCodec).unwrap();

        let mut expected = b"caf\xe9".to_vec();
        expected.extend_from_slice(LINE_ENDING);
        expected.extend_from_slice(b"na\xefve");
        expected.extend_from_slice(LINE_ENDING);
        assert_eq!(fs::read(root.join("latin1.txt")).unwrap(), expected);
    }
}
