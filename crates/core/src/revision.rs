//! Revisions and patch-chain replay.
//!
//! Each revision stores a patch against the placeholder text of the revision
//! before it (revision 0 against the empty string). The text of revision `n`
//! is rebuilt by applying patches `0..=n` in order.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::links::{find_placeholders, link_for, Link};
use crate::patch;
use crate::render::RenderMode;
use crate::types::RevNum;

/// One stored revision of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub rev_num: RevNum,
    pub use_markdown: bool,
    /// Encoded patch against the previous revision's placeholder text.
    pub patch_text: String,
    /// Link table, ordered by link number.
    pub links: Vec<Link>,
}

impl Revision {
    /// Render mode selected by this revision's markdown flag.
    pub fn render_mode(&self) -> RenderMode {
        RenderMode::from_use_markdown(self.use_markdown)
    }

    /// Check that every placeholder in `text` names a link in this revision.
    pub fn check_placeholders(&self, text: &str) -> Result<(), CoreError> {
        for m in find_placeholders(text)? {
            link_for(&self.links, m.link_num)?;
        }
        Ok(())
    }
}

/// Check that `revisions` are numbered `0, 1, 2, ...` with no gaps.
pub fn check_numbering(revisions: &[Revision]) -> Result<(), CoreError> {
    for (idx, rev) in revisions.iter().enumerate() {
        if usize::try_from(rev.rev_num).ok() != Some(idx) {
            return Err(CoreError::Consistency(format!(
                "Revision at position {idx} is numbered {}",
                rev.rev_num
            )));
        }
    }
    Ok(())
}

/// Rebuild the placeholder text of revision `rev_num`.
///
/// The caller is responsible for range policy; this only fails if `rev_num`
/// does not exist or the chain does not replay cleanly.
pub fn replay(revisions: &[Revision], rev_num: RevNum) -> Result<String, CoreError> {
    let last = usize::try_from(rev_num)
        .ok()
        .filter(|n| *n < revisions.len())
        .ok_or_else(|| {
            CoreError::Consistency(format!(
                "Revision {rev_num} is not in a chain of {} revisions",
                revisions.len()
            ))
        })?;

    let mut text = String::new();
    for (idx, rev) in revisions[..=last].iter().enumerate() {
        if usize::try_from(rev.rev_num).ok() != Some(idx) {
            return Err(CoreError::Consistency(format!(
                "Revision chain has a gap: position {idx} holds revision {}",
                rev.rev_num
            )));
        }
        text = patch::apply_encoded(&text, &rev.patch_text).map_err(|e| match e {
            CoreError::PatchApplication(msg) => {
                CoreError::PatchApplication(format!("revision {}: {msg}", rev.rev_num))
            }
            other => other,
        })?;
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn chain(texts: &[&str]) -> Vec<Revision> {
        let mut prev = String::new();
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let rev = Revision {
                    rev_num: i as RevNum,
                    use_markdown: true,
                    patch_text: patch::encode_diff(&prev, t).unwrap(),
                    links: vec![],
                };
                prev = t.to_string();
                rev
            })
            .collect()
    }

    #[test]
    fn replay_rebuilds_every_revision() {
        let texts = ["x", "y", "x", "x\nmore\n", ""];
        let revs = chain(&texts);
        for (i, t) in texts.iter().enumerate() {
            assert_eq!(replay(&revs, i as RevNum).unwrap(), *t);
        }
    }

    #[test]
    fn replay_out_of_chain_is_error() {
        let revs = chain(&["a"]);
        assert_matches!(replay(&revs, 1), Err(CoreError::Consistency(_)));
        assert_matches!(replay(&revs, -1), Err(CoreError::Consistency(_)));
    }

    #[test]
    fn replay_detects_gap() {
        let mut revs = chain(&["a", "b"]);
        revs[1].rev_num = 2;
        assert_matches!(replay(&revs, 1), Err(CoreError::Consistency(_)));
        assert!(check_numbering(&revs).is_err());
    }

    #[test]
    fn replay_reports_corrupt_patch() {
        let mut revs = chain(&["a\n", "b\n"]);
        revs[0].patch_text = patch::encode_diff("", "zzz\n").unwrap();
        let err = replay(&revs, 1).unwrap_err();
        assert_matches!(err, CoreError::PatchApplication(ref msg) if msg.contains("revision 1"));
    }

    #[test]
    fn placeholders_must_resolve() {
        let rev = Revision {
            rev_num: 0,
            use_markdown: false,
            patch_text: String::new(),
            links: vec![Link {
                link_num: 0,
                tgt_uid: None,
                tgt_title: "Home".into(),
                tgt_alias: None,
            }],
        };
        assert!(rev.check_placeholders("a [[0]]").is_ok());
        assert_matches!(
            rev.check_placeholders("a [[1]]"),
            Err(CoreError::Consistency(_))
        );
    }
}
