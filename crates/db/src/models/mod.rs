//! Row types for the wiki tables.

pub mod account;
pub mod link;
pub mod page;
pub mod revision;
