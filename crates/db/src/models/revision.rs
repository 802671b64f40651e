use serde::Serialize;
use sqlx::FromRow;
use hypertext_core::links::Link;
use hypertext_core::revision::Revision;
use hypertext_core::types::{DbId, RevNum, Timestamp};

/// A row from the `revisions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RevisionRow {
    pub id: DbId,
    pub page_id: DbId,
    pub rev_num: RevNum,
    pub patch_text: String,
    pub use_markdown: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RevisionRow {
    /// Pair this row with its link table.
    pub fn into_revision(self, links: Vec<Link>) -> Revision {
        Revision {
            rev_num: self.rev_num,
            use_markdown: self.use_markdown,
            patch_text: self.patch_text,
            links,
        }
    }
}
