pub mod spool;
pub mod validation;
