//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Writes that touch a page's
//! revision pointers lock the page row for the whole transaction.

pub mod account_repo;
pub mod page_repo;
pub mod revision_repo;

pub use account_repo::AccountRepo;
pub use page_repo::PageRepo;
pub use revision_repo::RevisionRepo;
