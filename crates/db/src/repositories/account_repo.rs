//! Repository for the `accounts` table.

use sqlx::{PgConnection, PgPool};
use hypertext_core::error::CoreError;
use hypertext_core::naming::{
    validate_uid, HOME_SLUG, HOME_TITLE, HOME_WELCOME, PRIVATE_HOME_SLUG, PRIVATE_HOME_TITLE,
    PRIVATE_HOME_WELCOME,
};
use hypertext_core::types::DbId;

use crate::error::{DbError, DbResult};
use crate::models::account::Account;
use crate::repositories::{PageRepo, RevisionRepo};

/// Column list for accounts queries.
const COLUMNS: &str = "id, uid, created_at, updated_at";

pub struct AccountRepo;

impl AccountRepo {
    /// Create an account with its public and private home pages.
    ///
    /// Both home pages get a published welcome revision in the same
    /// transaction as the account row.
    pub async fn create(pool: &PgPool, uid: &str) -> DbResult<Account> {
        validate_uid(uid)?;
        let mut tx = pool.begin().await?;

        let query = format!("INSERT INTO accounts (uid) VALUES ($1) RETURNING {COLUMNS}");
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(uid)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                DbError::from(e).conflict_on_unique(|| format!("Account '{uid}' already exists"))
            })?;

        for (slug, title, text, is_private) in [
            (HOME_SLUG, HOME_TITLE, HOME_WELCOME, false),
            (PRIVATE_HOME_SLUG, PRIVATE_HOME_TITLE, PRIVATE_HOME_WELCOME, true),
        ] {
            let page = PageRepo::insert(&mut tx, account.id, slug, title, is_private).await?;
            RevisionRepo::publish_initial_text(&mut tx, &page, text).await?;
        }

        tx.commit().await?;
        tracing::info!(account_id = account.id, uid, "Created account");
        Ok(account)
    }

    pub async fn find_by_uid(pool: &PgPool, uid: &str) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE uid = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(uid)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock an account row so slug allocation for its pages is serialized.
    pub(crate) async fn lock(conn: &mut PgConnection, id: DbId) -> DbResult<()> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(DbError::Core(CoreError::NotFound {
                entity: "account",
                id,
            }))?;
        Ok(())
    }
}
