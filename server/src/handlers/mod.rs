//! Request handlers for the account endpoints.

mod fetch;
mod remove;
mod upsert;

pub use fetch::*;
pub use remove::*;
pub use upsert::*;
