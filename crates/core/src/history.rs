//! A page's revision history and its draft/publish state machine.
//!
//! ```text
//!               save_draft                publish_draft
//! NoRevision ─────────────▶ Draft ──────────────────────▶ Published
//!      ▲                      │  ▲                            │
//!      └──── revert_draft ────┘  └──────── save_draft ────────┘
//!        (no current revision)    revert_draft ──▶ Published
//! ```
//!
//! The draft is always numbered `current + 1` (or 0 before the first
//! publish). Only the four transitions on [`PageHistory`] move the
//! pointers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::links::{extract_links, inject_links};
use crate::patch;
use crate::revision::{check_numbering, replay, Revision};
use crate::types::RevNum;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a page is in its draft/publish lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PageState {
    /// Never saved.
    NoRevision,
    /// A mutable draft exists on top of `current` (if any).
    Draft { current: Option<RevNum> },
    /// A current revision exists and there is no draft.
    Published { current: RevNum },
}

impl PageState {
    /// Build the state from the stored `curr_rev_num` / `draft_rev_num` pair.
    pub fn from_pointers(
        curr_rev_num: Option<RevNum>,
        draft_rev_num: Option<RevNum>,
    ) -> Result<Self, CoreError> {
        match (curr_rev_num, draft_rev_num) {
            (Some(c), _) if c < 0 => Err(CoreError::Consistency(format!(
                "Current revision number {c} is negative"
            ))),
            (None, None) => Ok(Self::NoRevision),
            (Some(c), None) => Ok(Self::Published { current: c }),
            (c, Some(d)) if d == next_after(c) => Ok(Self::Draft { current: c }),
            (c, Some(d)) => Err(CoreError::Consistency(format!(
                "Draft revision {d} does not follow current revision {c:?}"
            ))),
        }
    }

    pub fn current(&self) -> Option<RevNum> {
        match self {
            Self::NoRevision => None,
            Self::Draft { current } => *current,
            Self::Published { current } => Some(*current),
        }
    }

    pub fn draft(&self) -> Option<RevNum> {
        match self {
            Self::Draft { current } => Some(next_after(*current)),
            _ => None,
        }
    }

    /// Number of revisions that must exist in this state.
    pub(crate) fn revision_count(&self) -> usize {
        let highest = self.draft().or(self.current());
        highest.map_or(0, |n| n as usize + 1)
    }

    /// String representation for display and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRevision => "no_revision",
            Self::Draft { .. } => "draft",
            Self::Published { .. } => "published",
        }
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn next_after(current: Option<RevNum>) -> RevNum {
    current.map_or(0, |c| c + 1)
}

// ---------------------------------------------------------------------------
// Transition results
// ---------------------------------------------------------------------------

/// Outcome of [`PageHistory::save_draft`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSave {
    /// A new draft revision was appended.
    Created(RevNum),
    /// The existing draft was overwritten in place.
    Replaced(RevNum),
}

impl DraftSave {
    pub fn rev_num(&self) -> RevNum {
        match self {
            Self::Created(n) | Self::Replaced(n) => *n,
        }
    }
}

/// Raw text and markdown flag to pre-fill an editor with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditText {
    pub text: String,
    pub use_markdown: bool,
    /// `true` if the text comes from an unpublished draft.
    pub is_draft: bool,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// All revisions of one page plus its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHistory {
    owner_uid: String,
    state: PageState,
    revisions: Vec<Revision>,
}

impl PageHistory {
    /// History of a page that has never been saved.
    pub fn new(owner_uid: impl Into<String>) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            state: PageState::NoRevision,
            revisions: Vec::new(),
        }
    }

    /// Assemble a history from stored parts, checking that the pointers and
    /// revision numbering agree.
    pub fn from_parts(
        owner_uid: impl Into<String>,
        curr_rev_num: Option<RevNum>,
        draft_rev_num: Option<RevNum>,
        mut revisions: Vec<Revision>,
    ) -> Result<Self, CoreError> {
        let state = PageState::from_pointers(curr_rev_num, draft_rev_num)?;
        revisions.sort_by_key(|r| r.rev_num);
        check_numbering(&revisions)?;
        if revisions.len() != state.revision_count() {
            return Err(CoreError::Consistency(format!(
                "Page in state '{state}' (current {curr_rev_num:?}, draft {draft_rev_num:?}) \
                 has {} revisions",
                revisions.len()
            )));
        }
        for rev in &mut revisions {
            rev.links.sort_by_key(|l| l.link_num);
        }
        Ok(Self {
            owner_uid: owner_uid.into(),
            state,
            revisions,
        })
    }

    pub fn owner_uid(&self) -> &str {
        &self.owner_uid
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn current_rev_num(&self) -> Option<RevNum> {
        self.state.current()
    }

    pub fn draft_rev_num(&self) -> Option<RevNum> {
        self.state.draft()
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// Any stored revision, draft included.
    pub fn revision(&self, rev_num: RevNum) -> Option<&Revision> {
        usize::try_from(rev_num)
            .ok()
            .and_then(|idx| self.revisions.get(idx))
    }

    pub fn current_revision(&self) -> Option<&Revision> {
        self.current_rev_num().and_then(|n| self.revision(n))
    }

    pub fn draft_revision(&self) -> Option<&Revision> {
        self.draft_rev_num().and_then(|n| self.revision(n))
    }

    // -- reads ---------------------------------------------------------------

    /// Fail unless `rev_num` is a published revision.
    pub fn check_published(&self, rev_num: RevNum) -> Result<&Revision, CoreError> {
        let current = self.current_rev_num();
        match current {
            Some(c) if (0..=c).contains(&rev_num) => self.revision(rev_num).ok_or_else(|| {
                CoreError::Consistency(format!("Published revision {rev_num} is missing"))
            }),
            _ => Err(CoreError::RevisionOutOfRange {
                requested: rev_num,
                current,
            }),
        }
    }

    /// Placeholder text of published revision `rev_num`.
    pub fn placeholder_text(&self, rev_num: RevNum) -> Result<String, CoreError> {
        self.check_published(rev_num)?;
        replay(&self.revisions, rev_num)
    }

    /// Raw (link syntax) text of published revision `rev_num`.
    pub fn revision_text(&self, rev_num: RevNum) -> Result<String, CoreError> {
        let rev = self.check_published(rev_num)?;
        let text = replay(&self.revisions, rev_num)?;
        inject_links(&text, &rev.links)
    }

    /// Placeholder text of the draft, if there is one.
    pub fn draft_placeholder_text(&self) -> Result<Option<String>, CoreError> {
        self.draft_rev_num()
            .map(|n| replay(&self.revisions, n))
            .transpose()
    }

    /// Text to edit: the draft if present, else the current revision, else
    /// an empty markdown page.
    pub fn edit_text(&self) -> Result<EditText, CoreError> {
        let (rev, is_draft) = match (self.draft_revision(), self.current_revision()) {
            (Some(draft), _) => (draft, true),
            (None, Some(current)) => (current, false),
            (None, None) => {
                return Ok(EditText {
                    text: String::new(),
                    use_markdown: true,
                    is_draft: false,
                })
            }
        };
        let text = replay(&self.revisions, rev.rev_num)?;
        Ok(EditText {
            text: inject_links(&text, &rev.links)?,
            use_markdown: rev.use_markdown,
            is_draft,
        })
    }

    // -- transitions ---------------------------------------------------------

    /// Save `raw` as the draft, creating it if needed.
    ///
    /// The patch is always computed against the previous revision's text,
    /// never against a stale draft, so saving the same text twice stores the
    /// same patch.
    pub fn save_draft(&mut self, raw: &str, use_markdown: bool) -> Result<DraftSave, CoreError> {
        let current = self.current_rev_num();
        let rev_num = next_after(current);
        let base = match current {
            Some(c) => replay(&self.revisions, c)?,
            None => String::new(),
        };

        let extraction = extract_links(raw, &self.owner_uid);
        let revision = Revision {
            rev_num,
            use_markdown,
            patch_text: patch::encode_diff(&base, &extraction.text)?,
            links: extraction.links,
        };

        match self.state {
            PageState::Draft { .. } => {
                let idx = rev_num as usize;
                let slot = self.revisions.get_mut(idx).ok_or_else(|| {
                    CoreError::Consistency(format!("Draft revision {rev_num} is missing"))
                })?;
                *slot = revision;
                Ok(DraftSave::Replaced(rev_num))
            }
            PageState::NoRevision | PageState::Published { .. } => {
                self.revisions.push(revision);
                self.state = PageState::Draft { current };
                Ok(DraftSave::Created(rev_num))
            }
        }
    }

    /// Make the draft current. Returns the published revision number, or
    /// `None` (and changes nothing) if there is no draft.
    pub fn publish_draft(&mut self) -> Option<RevNum> {
        let draft = self.state.draft()?;
        self.state = PageState::Published { current: draft };
        Some(draft)
    }

    /// Discard the draft revision and its links. Returns the discarded
    /// revision number, or `None` (and changes nothing) if there is no draft.
    pub fn revert_draft(&mut self) -> Option<RevNum> {
        let draft = self.state.draft()?;
        let current = self.state.current();
        self.revisions.truncate(draft as usize);
        self.state = match current {
            Some(c) => PageState::Published { current: c },
            None => PageState::NoRevision,
        };
        Some(draft)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
