pub mod auth;

pub use auth::{auth_middleware, rate_limit_middleware};
