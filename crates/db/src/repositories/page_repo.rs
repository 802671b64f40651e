//! Repository for the `pages` table.
//!
//! Page rows are always read joined with `accounts` so the owner's uid is at
//! hand for link resolution.

use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};
use tracing::info;
use hypertext_core::error::CoreError;
use hypertext_core::history::PageHistory;
use hypertext_core::naming::{generate_slug, unique_slug, validate_title};
use hypertext_core::site::DirectorySnapshot;
use hypertext_core::types::DbId;

use crate::error::{DbError, DbResult};
use crate::models::page::Page;
use crate::repositories::{AccountRepo, RevisionRepo};

/// Column list for pages queries, against [`FROM`].
const COLUMNS: &str = "p.id, p.account_id, a.uid AS owner_uid, p.slug, p.title, p.is_private, \
                       p.curr_rev_num, p.draft_rev_num, p.created_at, p.updated_at";

const FROM: &str = "pages p JOIN accounts a ON a.id = p.account_id";

pub struct PageRepo;

impl PageRepo {
    /// Create an empty page. The slug is generated from the title and made
    /// unique among the owner's pages.
    pub async fn create(
        pool: &PgPool,
        account_id: DbId,
        title: &str,
        is_private: bool,
    ) -> DbResult<Page> {
        validate_title(title)?;
        let mut tx = pool.begin().await?;
        AccountRepo::lock(&mut tx, account_id).await?;

        if Self::title_exists_in(&mut tx, account_id, title).await? {
            return Err(CoreError::Conflict(format!("A page titled '{title}' already exists")).into());
        }
        let slug = Self::slug_for(&mut tx, account_id, title, None).await?;
        let page = Self::insert(&mut tx, account_id, &slug, title, is_private).await?;

        tx.commit().await?;
        info!(page_id = page.id, account_id, slug = %page.slug, "Created page");
        Ok(page)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE p.id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(
        pool: &PgPool,
        owner_uid: &str,
        slug: &str,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE a.uid = $1 AND p.slug = $2");
        sqlx::query_as::<_, Page>(&query)
            .bind(owner_uid)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Look up the page a link to `(owner_uid, title)` points at.
    pub async fn find_by_title(
        pool: &PgPool,
        owner_uid: &str,
        title: &str,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE a.uid = $1 AND p.title = $2");
        sqlx::query_as::<_, Page>(&query)
            .bind(owner_uid)
            .bind(title)
            .fetch_optional(pool)
            .await
    }

    pub async fn title_exists(
        pool: &PgPool,
        account_id: DbId,
        title: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::title_exists_in(&mut conn, account_id, title).await
    }

    /// All pages of an account, in creation order.
    pub async fn list_by_account(pool: &PgPool, account_id: DbId) -> Result<Vec<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE p.account_id = $1 ORDER BY p.id");
        sqlx::query_as::<_, Page>(&query)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Every page, optionally restricted to one owner, in id order.
    pub async fn list_all(pool: &PgPool, owner_uid: Option<&str>) -> Result<Vec<Page>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {FROM}
             WHERE ($1::text IS NULL OR a.uid = $1)
             ORDER BY p.id"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(owner_uid)
            .fetch_all(pool)
            .await
    }

    /// Set the private flag. Returns `true` if the page exists.
    pub async fn set_private(pool: &PgPool, id: DbId, is_private: bool) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE pages SET is_private = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(is_private)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Retitle a page and regenerate its slug.
    ///
    /// Stored links are not rewritten. With `create_redirect`, a published
    /// page under the old title links to the new title.
    pub async fn move_page(
        pool: &PgPool,
        id: DbId,
        new_title: &str,
        create_redirect: bool,
    ) -> DbResult<Page> {
        validate_title(new_title)?;
        let mut tx = pool.begin().await?;
        let page = Self::lock(&mut tx, id).await?;
        if page.is_home() {
            return Err(CoreError::Forbidden("Home pages cannot be moved".into()).into());
        }
        AccountRepo::lock(&mut tx, page.account_id).await?;
        if Self::title_exists_in(&mut tx, page.account_id, new_title).await? {
            return Err(
                CoreError::Conflict(format!("A page titled '{new_title}' already exists")).into(),
            );
        }

        let slug = Self::slug_for(&mut tx, page.account_id, new_title, Some(id)).await?;
        sqlx::query(
            "UPDATE pages SET title = $2, slug = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(new_title)
        .bind(&slug)
        .execute(&mut *tx)
        .await?;

        if create_redirect {
            let redirect_slug = Self::slug_for(&mut tx, page.account_id, &page.title, None).await?;
            let redirect =
                Self::insert(&mut tx, page.account_id, &redirect_slug, &page.title, false).await?;
            RevisionRepo::publish_initial_text(&mut tx, &redirect, &format!("[[{new_title}]]"))
                .await?;
        }

        let moved = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;
        info!(
            page_id = id,
            old_title = %page.title,
            new_title,
            create_redirect,
            "Moved page"
        );
        Ok(moved)
    }

    /// Delete a page with all its revisions and links.
    pub async fn delete(pool: &PgPool, id: DbId) -> DbResult<()> {
        let mut tx = pool.begin().await?;
        let page = Self::lock(&mut tx, id).await?;
        if page.is_home() {
            return Err(CoreError::Forbidden("Home pages cannot be deleted".into()).into());
        }
        sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(page_id = id, title = %page.title, "Deleted page");
        Ok(())
    }

    /// Load a page and its validated revision history.
    pub async fn load_history(pool: &PgPool, id: DbId) -> DbResult<(Page, PageHistory)> {
        let mut conn = pool.acquire().await?;
        let page = Self::fetch(&mut conn, id).await?;
        let history = RevisionRepo::load_history_in(&mut conn, &page).await?;
        Ok((page, history))
    }

    /// Load every page named by `(owner uid, title)` targets.
    pub async fn directory_for(
        pool: &PgPool,
        targets: &[(String, String)],
    ) -> Result<DirectorySnapshot, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::directory_in(&mut conn, targets).await
    }

    // -- connection-level helpers ---------------------------------------------

    pub(crate) async fn fetch(conn: &mut PgConnection, id: DbId) -> DbResult<Page> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE p.id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(DbError::Core(CoreError::NotFound { entity: "page", id }))
    }

    /// Fetch a page and hold its row lock until the transaction ends.
    pub(crate) async fn lock(conn: &mut PgConnection, id: DbId) -> DbResult<Page> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE p.id = $1 FOR UPDATE OF p");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(DbError::Core(CoreError::NotFound { entity: "page", id }))
    }

    pub(crate) async fn insert(
        conn: &mut PgConnection,
        account_id: DbId,
        slug: &str,
        title: &str,
        is_private: bool,
    ) -> DbResult<Page> {
        let id = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO pages (account_id, slug, title, is_private)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(account_id)
        .bind(slug)
        .bind(title)
        .bind(is_private)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            DbError::from(e).conflict_on_unique(|| format!("A page titled '{title}' already exists"))
        })?;
        Self::fetch(conn, id).await
    }

    pub(crate) async fn directory_in(
        conn: &mut PgConnection,
        targets: &[(String, String)],
    ) -> Result<DirectorySnapshot, sqlx::Error> {
        if targets.is_empty() {
            return Ok(DirectorySnapshot::new());
        }
        let (uids, titles): (Vec<String>, Vec<String>) = targets.iter().cloned().unzip();
        let query = format!(
            "SELECT {COLUMNS} FROM {FROM}
             WHERE (a.uid, p.title) IN (SELECT * FROM UNNEST($1::text[], $2::text[]))"
        );
        let pages = sqlx::query_as::<_, Page>(&query)
            .bind(uids)
            .bind(titles)
            .fetch_all(&mut *conn)
            .await?;
        Ok(pages.iter().map(Page::to_ref).collect())
    }

    async fn title_exists_in(
        conn: &mut PgConnection,
        account_id: DbId,
        title: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE account_id = $1 AND title = $2)",
        )
        .bind(account_id)
        .bind(title)
        .fetch_one(&mut *conn)
        .await
    }

    /// Unique slug for `title` among the account's pages other than `except`.
    async fn slug_for(
        conn: &mut PgConnection,
        account_id: DbId,
        title: &str,
        except: Option<DbId>,
    ) -> Result<String, sqlx::Error> {
        let taken: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM pages WHERE account_id = $1 AND ($2::bigint IS NULL OR id <> $2)",
        )
        .bind(account_id)
        .bind(except)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();
        Ok(unique_slug(&generate_slug(title), |s| taken.contains(s)))
    }
}
