pub mod conferences;
pub mod files;
pub mod health;
