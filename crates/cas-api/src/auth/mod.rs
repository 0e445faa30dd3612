//! Member authentication: argon2 password hashes, HS256 session tokens backed
//! by a session row, and the middleware that turns a bearer token into a
//! [`MemberContext`](models::MemberContext).

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
