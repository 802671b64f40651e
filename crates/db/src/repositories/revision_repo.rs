//! Repository for the `revisions` and `links` tables.
//!
//! The page's `curr_rev_num` / `draft_rev_num` pointers are written only
//! here. Every write locks the page row, rebuilds the core [`PageHistory`],
//! applies one transition, and persists what that transition reports.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use tracing::{debug, error, info};
use hypertext_core::error::CoreError;
use hypertext_core::history::{DraftSave, EditText, PageHistory};
use hypertext_core::links::Link;
use hypertext_core::render::{self, link_targets, RenderContext, RenderMode};
use hypertext_core::revision::Revision;
use hypertext_core::site::SiteConfig;
use hypertext_core::types::{DbId, RevNum};

use crate::error::{DbError, DbResult};
use crate::models::link::LinkRow;
use crate::models::page::Page;
use crate::models::revision::RevisionRow;
use crate::repositories::PageRepo;

/// Column list for revisions queries.
const COLUMNS: &str = "id, page_id, rev_num, patch_text, use_markdown, created_at, updated_at";

/// Column list for links queries, against `links l`.
const LINK_COLUMNS: &str =
    "l.id, l.revision_id, l.link_num, l.tgt_page_uid, l.tgt_page_title, l.tgt_page_alias";

pub struct RevisionRepo;

impl RevisionRepo {
    // -- transitions ---------------------------------------------------------

    /// Save `text` as the page's draft, creating the draft revision if there
    /// is none. Returns the stored revision.
    pub async fn save_draft(
        pool: &PgPool,
        page_id: DbId,
        text: &str,
        use_markdown: bool,
    ) -> DbResult<Revision> {
        let mut tx = pool.begin().await?;
        let page = PageRepo::lock(&mut tx, page_id).await?;
        let mut history = Self::load_history_in(&mut tx, &page).await?;

        let saved = history.save_draft(text, use_markdown)?;
        let revision = history
            .revision(saved.rev_num())
            .cloned()
            .ok_or_else(|| CoreError::Internal(format!("Saved draft {} is missing", saved.rev_num())))?;

        match saved {
            DraftSave::Created(rev_num) => {
                Self::insert(&mut tx, page_id, &revision).await?;
                sqlx::query("UPDATE pages SET draft_rev_num = $2, updated_at = NOW() WHERE id = $1")
                    .bind(page_id)
                    .bind(rev_num)
                    .execute(&mut *tx)
                    .await?;
            }
            DraftSave::Replaced(rev_num) => {
                let revision_id = sqlx::query_scalar::<_, DbId>(
                    "UPDATE revisions
                     SET patch_text = $3, use_markdown = $4, updated_at = NOW()
                     WHERE page_id = $1 AND rev_num = $2
                     RETURNING id",
                )
                .bind(page_id)
                .bind(rev_num)
                .bind(&revision.patch_text)
                .bind(revision.use_markdown)
                .fetch_one(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM links WHERE revision_id = $1")
                    .bind(revision_id)
                    .execute(&mut *tx)
                    .await?;
                Self::insert_links(&mut tx, revision_id, &revision.links).await?;
            }
        }

        tx.commit().await?;
        info!(
            page_id,
            rev_num = revision.rev_num,
            created = matches!(saved, DraftSave::Created(_)),
            link_count = revision.links.len(),
            "Saved draft"
        );
        Ok(revision)
    }

    /// Make the draft current. Returns `false` if there is no draft.
    pub async fn publish_draft(pool: &PgPool, page_id: DbId) -> DbResult<bool> {
        let mut tx = pool.begin().await?;
        let page = PageRepo::lock(&mut tx, page_id).await?;
        let mut history = Self::load_history_in(&mut tx, &page).await?;

        let Some(rev_num) = history.publish_draft() else {
            debug!(page_id, "No draft to publish");
            return Ok(false);
        };
        sqlx::query(
            "UPDATE pages SET curr_rev_num = $2, draft_rev_num = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(page_id)
        .bind(rev_num)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(page_id, rev_num, "Published draft");
        Ok(true)
    }

    /// Delete the draft revision and its links. Returns `false` if there is
    /// no draft.
    pub async fn revert_draft(pool: &PgPool, page_id: DbId) -> DbResult<bool> {
        let mut tx = pool.begin().await?;
        let page = PageRepo::lock(&mut tx, page_id).await?;
        let mut history = Self::load_history_in(&mut tx, &page).await?;

        let Some(rev_num) = history.revert_draft() else {
            debug!(page_id, "No draft to revert");
            return Ok(false);
        };
        sqlx::query("UPDATE pages SET draft_rev_num = NULL, updated_at = NOW() WHERE id = $1")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM revisions WHERE page_id = $1 AND rev_num = $2")
            .bind(page_id)
            .bind(rev_num)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(page_id, rev_num, "Reverted draft");
        Ok(true)
    }

    // -- reads ---------------------------------------------------------------

    /// Raw text of a published revision.
    pub async fn get_revision_text(
        pool: &PgPool,
        page_id: DbId,
        rev_num: RevNum,
    ) -> DbResult<String> {
        let (_, history) = PageRepo::load_history(pool, page_id).await?;
        Ok(history.revision_text(rev_num)?)
    }

    /// Text to pre-fill an editor with: the draft, else the current revision.
    pub async fn get_edit_text(pool: &PgPool, page_id: DbId) -> DbResult<EditText> {
        let (_, history) = PageRepo::load_history(pool, page_id).await?;
        Ok(history.edit_text()?)
    }

    /// Render a published revision for `viewer_uid`, resolving links against
    /// the pages as they are now.
    pub async fn render_revision(
        pool: &PgPool,
        site: &SiteConfig,
        page_id: DbId,
        rev_num: RevNum,
        viewer_uid: Option<&str>,
        mode: Option<RenderMode>,
    ) -> DbResult<String> {
        let mut conn = pool.acquire().await?;
        let page = PageRepo::fetch(&mut conn, page_id).await?;
        if !page.to_ref().can_view(viewer_uid) {
            return Err(CoreError::Forbidden(format!(
                "Page '{}' is not visible to this user",
                page.title
            ))
            .into());
        }
        let history = Self::load_history_in(&mut conn, &page).await?;
        let targets = link_targets(&history.check_published(rev_num)?.links, &page.owner_uid);
        let directory = PageRepo::directory_in(&mut conn, &targets).await?;

        let ctx = RenderContext {
            site,
            page_owner_uid: &page.owner_uid,
            viewer_uid,
            directory: &directory,
        };
        Ok(render::render_revision(&history, rev_num, mode, &ctx)?)
    }

    /// Stored revisions of a page with their links, ordered by revision
    /// number. Not validated; see [`PageRepo::load_history`].
    pub async fn load_chain(pool: &PgPool, page_id: DbId) -> Result<Vec<Revision>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::load_chain_in(&mut conn, page_id).await
    }

    // -- connection-level helpers ---------------------------------------------

    pub(crate) async fn load_chain_in(
        conn: &mut PgConnection,
        page_id: DbId,
    ) -> Result<Vec<Revision>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM revisions WHERE page_id = $1 ORDER BY rev_num");
        let rows = sqlx::query_as::<_, RevisionRow>(&query)
            .bind(page_id)
            .fetch_all(&mut *conn)
            .await?;

        let query = format!(
            "SELECT {LINK_COLUMNS} FROM links l
             JOIN revisions r ON r.id = l.revision_id
             WHERE r.page_id = $1
             ORDER BY l.revision_id, l.link_num"
        );
        let link_rows = sqlx::query_as::<_, LinkRow>(&query)
            .bind(page_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut links: HashMap<DbId, Vec<Link>> = HashMap::new();
        for row in link_rows {
            links.entry(row.revision_id).or_default().push(row.into());
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let revision_links = links.remove(&row.id).unwrap_or_default();
                row.into_revision(revision_links)
            })
            .collect())
    }

    pub(crate) async fn load_history_in(
        conn: &mut PgConnection,
        page: &Page,
    ) -> DbResult<PageHistory> {
        let revisions = Self::load_chain_in(conn, page.id).await?;
        PageHistory::from_parts(
            page.owner_uid.as_str(),
            page.curr_rev_num,
            page.draft_rev_num,
            revisions,
        )
        .map_err(|e| {
            error!(page_id = page.id, error = %e, "Stored revision history is inconsistent");
            DbError::Core(e)
        })
    }

    /// Give a freshly inserted page a published revision 0 holding `text`.
    pub(crate) async fn publish_initial_text(
        conn: &mut PgConnection,
        page: &Page,
        text: &str,
    ) -> DbResult<()> {
        let mut history = PageHistory::new(page.owner_uid.as_str());
        let rev_num = history.save_draft(text, true)?.rev_num();
        history.publish_draft();
        let revision = history
            .revision(rev_num)
            .ok_or_else(|| CoreError::Internal(format!("Initial revision {rev_num} is missing")))?;

        Self::insert(conn, page.id, revision).await?;
        sqlx::query(
            "UPDATE pages SET curr_rev_num = $2, draft_rev_num = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(page.id)
        .bind(rev_num)
        .execute(&mut *conn)
        .await?;
        info!(page_id = page.id, title = %page.title, "Published initial revision");
        Ok(())
    }

    async fn insert(conn: &mut PgConnection, page_id: DbId, revision: &Revision) -> DbResult<DbId> {
        let revision_id = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO revisions (page_id, rev_num, patch_text, use_markdown)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(page_id)
        .bind(revision.rev_num)
        .bind(&revision.patch_text)
        .bind(revision.use_markdown)
        .fetch_one(&mut *conn)
        .await?;
        Self::insert_links(conn, revision_id, &revision.links).await?;
        Ok(revision_id)
    }

    async fn insert_links(
        conn: &mut PgConnection,
        revision_id: DbId,
        links: &[Link],
    ) -> Result<(), sqlx::Error> {
        for link in links {
            sqlx::query(
                "INSERT INTO links (revision_id, link_num, tgt_page_uid, tgt_page_title, tgt_page_alias)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(revision_id)
            .bind(link.link_num)
            .bind(&link.tgt_uid)
            .bind(&link.tgt_title)
            .bind(&link.tgt_alias)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}
