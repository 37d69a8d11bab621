pub mod catalog;
pub mod content_store;
pub mod error;
pub mod keys;
pub mod publisher;
