//! Line-level diff/patch engine for revision storage.
//!
//! A [`Patch`] transforms one text into another. Revisions store patches in
//! their encoded form (see [`encode_diff`] and [`apply_encoded`]); nothing
//! outside this module inspects the encoding.
//!
//! Lines keep their terminators, so reconstruction is byte-exact for texts
//! with or without a trailing newline.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Patch representation
// ---------------------------------------------------------------------------

/// A contiguous replacement of lines in the base text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Index of the first base line this hunk touches.
    pub start: usize,
    /// Base lines removed by this hunk. Checked on apply.
    pub removed: Vec<String>,
    /// Lines inserted in place of `removed`.
    pub added: Vec<String>,
}

/// An ordered set of non-overlapping hunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub hunks: Vec<Hunk>,
}

impl Patch {
    /// `true` if applying this patch leaves the base text unchanged.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Encode for storage.
    pub fn to_text(&self) -> Result<String, CoreError> {
        serde_json::to_string(self)
            .map_err(|e| CoreError::Internal(format!("Failed to encode patch: {e}")))
    }

    /// Decode a stored patch. A malformed encoding is a consistency violation.
    pub fn from_text(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text)
            .map_err(|e| CoreError::PatchApplication(format!("Malformed patch text: {e}")))
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Compute the patch turning `old` into `new`.
///
/// Lines are compared with Myers' algorithm, which runs in linear space.
pub fn diff(old: &str, new: &str) -> Patch {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    for op in similar::capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            hunks.extend(current.take());
            continue;
        }
        // Adjacent deletes and inserts share one hunk.
        let hunk = current.get_or_insert_with(|| Hunk {
            start: old_range.start,
            removed: Vec::new(),
            added: Vec::new(),
        });
        hunk.removed
            .extend(old_lines[old_range].iter().map(|l| l.to_string()));
        hunk.added
            .extend(new_lines[new_range].iter().map(|l| l.to_string()));
    }
    hunks.extend(current);

    Patch { hunks }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Apply `patch` to `base`.
///
/// Fails with [`CoreError::PatchApplication`] if the hunks are out of order,
/// run past the end of the base, or the removed lines do not match.
pub fn apply(base: &str, patch: &Patch) -> Result<String, CoreError> {
    let base_lines = split_lines(base);
    let mut out = String::with_capacity(base.len());
    let mut cursor = 0usize;

    for (idx, hunk) in patch.hunks.iter().enumerate() {
        if hunk.start < cursor {
            return Err(CoreError::PatchApplication(format!(
                "Hunk {idx} starts at line {} before the end of the previous hunk (line {cursor})",
                hunk.start
            )));
        }
        let end = hunk.start + hunk.removed.len();
        if end > base_lines.len() {
            return Err(CoreError::PatchApplication(format!(
                "Hunk {idx} spans lines {}..{end} but the base has {} lines",
                hunk.start,
                base_lines.len()
            )));
        }

        for line in &base_lines[cursor..hunk.start] {
            out.push_str(line);
        }
        let matches = base_lines[hunk.start..end]
            .iter()
            .zip(hunk.removed.iter())
            .all(|(have, want)| *have == want.as_str());
        if !matches {
            return Err(CoreError::PatchApplication(format!(
                "Hunk {idx} does not match the base text at line {}",
                hunk.start
            )));
        }
        for line in &hunk.added {
            out.push_str(line);
        }
        cursor = end;
    }

    for line in &base_lines[cursor..] {
        out.push_str(line);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Encoded form
// ---------------------------------------------------------------------------

/// Diff `old` against `new` and return the storage encoding.
pub fn encode_diff(old: &str, new: &str) -> Result<String, CoreError> {
    diff(old, new).to_text()
}

/// Decode a stored patch and apply it to `base`.
pub fn apply_encoded(base: &str, patch_text: &str) -> Result<String, CoreError> {
    let patch = Patch::from_text(patch_text)?;
    apply(base, &patch)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn roundtrip(old: &str, new: &str) {
        let patch = diff(old, new);
        assert_eq!(apply(old, &patch).unwrap(), new, "old={old:?} new={new:?}");
    }

    // -- diff ----------------------------------------------------------------

    #[test]
    fn diff_against_empty_is_single_insertion() {
        let patch = diff("", "line1\nline2");
        assert_eq!(patch.hunks.len(), 1);
        assert_eq!(patch.hunks[0].start, 0);
        assert!(patch.hunks[0].removed.is_empty());
        assert_eq!(patch.hunks[0].added, vec!["line1\n", "line2"]);
    }

    #[test]
    fn diff_identical_texts_is_empty() {
        assert!(diff("same\ntext\n", "same\ntext\n").is_empty());
    }

    #[test]
    fn diff_changed_middle_line_touches_only_that_line() {
        let patch = diff("a\nb\nc\n", "a\nB\nc\n");
        assert_eq!(patch.hunks.len(), 1);
        assert_eq!(patch.hunks[0].start, 1);
        assert_eq!(patch.hunks[0].removed, vec!["b\n"]);
        assert_eq!(patch.hunks[0].added, vec!["B\n"]);
    }

    #[test]
    fn diff_large_rewrite_stays_small() {
        let old: String = (0..3_000).map(|i| format!("old line {i}\n")).collect();
        let new: String = (0..3_000).map(|i| format!("new line {i}\n")).collect();
        let patch = diff(&old, &new);
        assert_eq!(patch.hunks.len(), 1);
        assert_eq!(patch.hunks[0].removed.len(), 3_000);
        assert_eq!(patch.hunks[0].added.len(), 3_000);
        assert_eq!(apply(&old, &patch).unwrap(), new);
    }

    #[test]
    fn diff_large_page_with_sparse_edits() {
        let old: String = (0..20_000).map(|i| format!("line {i}\n")).collect();
        let new = old
            .replace("line 10\n", "line ten\n")
            .replace("line 19999\n", "last line\n");
        let patch = diff(&old, &new);
        assert_eq!(patch.hunks.len(), 2);
        assert_eq!(patch.hunks[0].start, 10);
        assert_eq!(patch.hunks[1].start, 19_999);
        assert_eq!(apply(&old, &patch).unwrap(), new);
    }

    #[test]
    fn diff_separate_edits_produce_separate_hunks() {
        let patch = diff("a\nb\nc\nd\ne\n", "A\nb\nc\nd\nE\n");
        assert_eq!(patch.hunks.len(), 2);
        assert_eq!(patch.hunks[0].start, 0);
        assert_eq!(patch.hunks[1].start, 4);
    }

    // -- apply ---------------------------------------------------------------

    #[test]
    fn apply_reconstructs_edits() {
        roundtrip("", "");
        roundtrip("", "x");
        roundtrip("x", "");
        roundtrip("x", "y");
        roundtrip("a\nb\nc", "a\nc");
        roundtrip("a\nb\nc", "a\nb\nc\n");
        roundtrip("a\nb\nc\n", "c\nb\na\n");
        roundtrip("one [[0]]\ntwo\n", "one [[0]]\ninserted\ntwo\n[[1]]");
    }

    #[test]
    fn apply_rejects_mismatched_base() {
        let patch = diff("a\nb\n", "a\nc\n");
        assert_matches!(
            apply("a\nzzz\n", &patch),
            Err(CoreError::PatchApplication(_))
        );
    }

    #[test]
    fn apply_rejects_hunk_past_end() {
        let patch = diff("a\nb\nc\n", "a\nb\n");
        assert_matches!(apply("a\n", &patch), Err(CoreError::PatchApplication(_)));
    }

    #[test]
    fn apply_rejects_out_of_order_hunks() {
        let patch = Patch {
            hunks: vec![
                Hunk {
                    start: 2,
                    removed: vec![],
                    added: vec!["x\n".into()],
                },
                Hunk {
                    start: 0,
                    removed: vec![],
                    added: vec!["y\n".into()],
                },
            ],
        };
        assert_matches!(
            apply("a\nb\nc\n", &patch),
            Err(CoreError::PatchApplication(_))
        );
    }

    // -- encoding ------------------------------------------------------------

    #[test]
    fn encoded_patch_applies() {
        let text = encode_diff("hello\n", "hello\nworld\n").unwrap();
        assert_eq!(apply_encoded("hello\n", &text).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn malformed_encoding_is_patch_error() {
        let err = apply_encoded("", "not a patch").unwrap_err();
        assert!(err.is_consistency_violation());
    }
}
