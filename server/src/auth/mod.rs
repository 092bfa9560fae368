//! Authentication for the account endpoints.

mod middleware;

pub use middleware::AuthUser;
