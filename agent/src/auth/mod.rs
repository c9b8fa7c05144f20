//! Authentication for the control API.

mod middleware;

pub use middleware::AuthUser;
