//! Page rows, joined with the owning account's uid.

use serde::Serialize;
use sqlx::FromRow;
use hypertext_core::error::CoreError;
use hypertext_core::history::PageState;
use hypertext_core::naming::is_home_slug;
use hypertext_core::site::PageRef;
use hypertext_core::types::{DbId, RevNum, Timestamp};

/// A row from the `pages` table plus `accounts.uid`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub account_id: DbId,
    pub owner_uid: String,
    pub slug: String,
    pub title: String,
    pub is_private: bool,
    pub curr_rev_num: Option<RevNum>,
    pub draft_rev_num: Option<RevNum>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Page {
    pub fn state(&self) -> Result<PageState, CoreError> {
        PageState::from_pointers(self.curr_rev_num, self.draft_rev_num)
    }

    pub fn is_home(&self) -> bool {
        is_home_slug(&self.slug)
    }

    pub fn to_ref(&self) -> PageRef {
        PageRef {
            id: self.id,
            owner_uid: self.owner_uid.clone(),
            slug: self.slug.clone(),
            title: self.title.clone(),
            is_private: self.is_private,
            curr_rev_num: self.curr_rev_num,
        }
    }
}
