//! Database module for PostgreSQL persistence.

mod accounts;
mod pool;

pub use accounts::*;
pub use pool::*;
