//! Offline consistency audit for stored page histories.
//!
//! Replays every page's revision chain from the database and reports pages
//! whose history cannot be reconstructed.

pub mod config;
pub mod scan;
