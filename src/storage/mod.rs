mod entries;
mod feeds;
mod jobs;
mod schema;
mod types;

pub use jobs::Selection;
pub use schema::Database;
pub use types::{DatabaseError, Feed, Job, JobList, StoreError};
