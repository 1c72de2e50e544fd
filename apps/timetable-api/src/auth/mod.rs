pub mod middleware;
pub mod password;
pub mod tokens;
pub mod verification;
