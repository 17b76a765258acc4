pub mod error;
pub mod redb_store;

pub use error::{Result, StoreError};
pub use redb_store::RedbStore;
