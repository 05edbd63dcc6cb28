pub mod auth;

pub use auth::{authorization_check, AuthorizationContext, PING_PATH, SCOPE_HEADER};
