//! Revision and link engine for a multi-tenant wiki.
//!
//! Page text is stored as a chain of patches over *placeholder text*, where
//! every `[[uid::title|alias]]` link has been replaced by a numbered `[[N]]`
//! and recorded in the revision's link table. Links are resolved against
//! live page state only when a revision is rendered.
//!
//! This crate has no internal dependencies and performs no I/O.

pub mod audit;
pub mod error;
pub mod history;
pub mod links;
pub mod memory;
pub mod naming;
pub mod patch;
pub mod render;
pub mod revision;
pub mod site;
pub mod types;
