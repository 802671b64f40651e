/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Zero-based, gap-free revision number within one page.
pub type RevNum = i32;

/// Zero-based link number within one revision, in first-occurrence order.
pub type LinkNum = i32;
