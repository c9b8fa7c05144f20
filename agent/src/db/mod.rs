//! SQLite persistence for the key-value store.

mod pool;
mod store;

pub use pool::*;
pub use store::*;
