pub mod auth;
pub mod authz;
pub mod boards;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod posts;
pub mod rate_limit;
pub mod replies;
pub mod state;
pub mod users;
pub mod verification;

mod convert;
