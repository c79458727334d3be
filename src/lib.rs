//! Feed-refresh job scheduler.
//!
//! Decides which feeds to fetch next. Feeds are paced by how recently they
//! published an entry and cut off after repeated parsing errors; fetching,
//! parsing and storing entries belong to the workers that consume the
//! produced [`storage::JobList`]s.

pub mod config;
pub mod policy;
pub mod scheduler;
pub mod storage;
