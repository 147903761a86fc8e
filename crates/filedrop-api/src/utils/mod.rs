pub mod ip_extraction;
pub mod range;
pub mod request;
pub mod upload;
