pub mod delete;
pub mod expiry;
pub mod file;
pub mod health;
pub mod upload;
