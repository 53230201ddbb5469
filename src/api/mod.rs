pub mod download;
pub mod error;
pub mod files;
pub mod search;

pub use error::ApiError;
