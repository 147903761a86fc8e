pub mod access_key;
pub mod middleware;
