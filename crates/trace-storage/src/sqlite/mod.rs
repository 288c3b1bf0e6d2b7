//! SQLite-backed storage implementation.

mod filter;
mod records;
pub mod schema;
mod statuses;
mod store;
mod transaction;

pub use store::{SqliteStore, StoreOptions};
