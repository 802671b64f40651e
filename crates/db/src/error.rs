use hypertext_core::error::CoreError;

/// Errors returned by the repository layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A domain-level error from `hypertext_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Name of the `uq_` constraint a failed write violated, if any.
    ///
    /// PostgreSQL reports unique violations as SQLSTATE 23505.
    pub fn unique_constraint(&self) -> Option<&str> {
        match self {
            DbError::Database(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23505") =>
            {
                db_err.constraint().filter(|c| c.starts_with("uq_"))
            }
            _ => None,
        }
    }

    /// Whether the stored history of a page is corrupt.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, DbError::Core(e) if e.is_consistency_violation())
    }

    /// Turn a unique-constraint violation into a domain conflict.
    pub(crate) fn conflict_on_unique(self, message: impl FnOnce() -> String) -> Self {
        if self.unique_constraint().is_some() {
            DbError::Core(CoreError::Conflict(message()))
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn migrate_errors_convert() {
        let err: DbError = sqlx::migrate::MigrateError::VersionMissing(3).into();
        assert_matches!(err, DbError::Migrate(_));
        assert!(!err.is_consistency_violation());
        assert_eq!(err.unique_constraint(), None);
    }

    #[test]
    fn core_errors_keep_their_kind() {
        let err: DbError = CoreError::PatchApplication("bad hunk".into()).into();
        assert!(err.is_consistency_violation());
        assert_eq!(err.to_string(), CoreError::PatchApplication("bad hunk".into()).to_string());
    }
}
