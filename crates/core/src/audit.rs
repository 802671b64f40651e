//! Offline verification of a page's stored revision chain.
//!
//! Unlike the read paths, which stop at the first problem, an audit collects
//! every issue it can find so a corrupt page can be diagnosed in one pass.

use serde::Serialize;

use crate::history::{PageHistory, PageState};
use crate::links::find_placeholders;
use crate::patch;
use crate::revision::Revision;
use crate::types::RevNum;

// ---------------------------------------------------------------------------
// Issue types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// `curr_rev_num` / `draft_rev_num` do not form a valid state.
    StatePointers,
    /// Revision count disagrees with the state pointers.
    RevisionCount,
    /// Revision numbers are not `0, 1, 2, ...`.
    NumberingGap,
    /// A stored patch does not apply to the previous revision's text.
    PatchApplication,
    /// Link numbers in a revision are not `0, 1, 2, ...`.
    LinkNumbering,
    /// A placeholder names a link the revision does not have.
    DanglingPlaceholder,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatePointers => "state_pointers",
            Self::RevisionCount => "revision_count",
            Self::NumberingGap => "numbering_gap",
            Self::PatchApplication => "patch_application",
            Self::LinkNumbering => "link_numbering",
            Self::DanglingPlaceholder => "dangling_placeholder",
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found in a revision chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainIssue {
    /// Revision the issue was found in; `None` for page-level issues.
    pub rev_num: Option<RevNum>,
    pub kind: IssueKind,
    pub detail: String,
}

impl ChainIssue {
    fn page(kind: IssueKind, detail: String) -> Self {
        Self {
            rev_num: None,
            kind,
            detail,
        }
    }

    fn revision(rev_num: RevNum, kind: IssueKind, detail: String) -> Self {
        Self {
            rev_num: Some(rev_num),
            kind,
            detail,
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify an assembled history, draft included.
pub fn verify_history(history: &PageHistory) -> Vec<ChainIssue> {
    verify_chain(
        history.current_rev_num(),
        history.draft_rev_num(),
        history.revisions(),
    )
}

/// Verify stored parts that may not assemble into a [`PageHistory`].
///
/// `revisions` must be ordered by revision number.
pub fn verify_chain(
    curr_rev_num: Option<RevNum>,
    draft_rev_num: Option<RevNum>,
    revisions: &[Revision],
) -> Vec<ChainIssue> {
    let mut issues = Vec::new();

    match PageState::from_pointers(curr_rev_num, draft_rev_num) {
        Ok(state) if state.revision_count() != revisions.len() => {
            issues.push(ChainIssue::page(
                IssueKind::RevisionCount,
                format!(
                    "State '{state}' expects {} revisions, found {}",
                    state.revision_count(),
                    revisions.len()
                ),
            ));
        }
        Ok(_) => {}
        Err(e) => issues.push(ChainIssue::page(IssueKind::StatePointers, e.to_string())),
    }

    let mut text = String::new();
    for (idx, rev) in revisions.iter().enumerate() {
        if usize::try_from(rev.rev_num).ok() != Some(idx) {
            issues.push(ChainIssue::revision(
                rev.rev_num,
                IssueKind::NumberingGap,
                format!("Expected revision {idx}"),
            ));
            // Later patches were made against a revision that is missing.
            break;
        }

        check_link_numbering(rev, &mut issues);

        text = match patch::apply_encoded(&text, &rev.patch_text) {
            Ok(next) => next,
            Err(e) => {
                issues.push(ChainIssue::revision(
                    rev.rev_num,
                    IssueKind::PatchApplication,
                    e.to_string(),
                ));
                break;
            }
        };

        check_placeholders(rev, &text, &mut issues);
    }

    issues
}

fn check_link_numbering(rev: &Revision, issues: &mut Vec<ChainIssue>) {
    for (idx, link) in rev.links.iter().enumerate() {
        if usize::try_from(link.link_num).ok() != Some(idx) {
            issues.push(ChainIssue::revision(
                rev.rev_num,
                IssueKind::LinkNumbering,
                format!("Link at position {idx} is numbered {}", link.link_num),
            ));
            return;
        }
    }
}

fn check_placeholders(rev: &Revision, text: &str, issues: &mut Vec<ChainIssue>) {
    let found = match find_placeholders(text) {
        Ok(found) => found,
        Err(e) => {
            issues.push(ChainIssue::revision(
                rev.rev_num,
                IssueKind::DanglingPlaceholder,
                e.to_string(),
            ));
            return;
        }
    };
    for m in found {
        if !rev.links.iter().any(|l| l.link_num == m.link_num) {
            issues.push(ChainIssue::revision(
                rev.rev_num,
                IssueKind::DanglingPlaceholder,
                format!("Placeholder [[{}]] has no link", m.link_num),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
