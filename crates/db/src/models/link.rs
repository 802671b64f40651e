use serde::Serialize;
use sqlx::FromRow;
use hypertext_core::links::Link;
use hypertext_core::types::{DbId, LinkNum};

/// A row from the `links` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LinkRow {
    pub id: DbId,
    pub revision_id: DbId,
    pub link_num: LinkNum,
    pub tgt_page_uid: Option<String>,
    pub tgt_page_title: String,
    pub tgt_page_alias: Option<String>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            link_num: row.link_num,
            tgt_uid: row.tgt_page_uid,
            tgt_title: row.tgt_page_title,
            tgt_alias: row.tgt_page_alias,
        }
    }
}
