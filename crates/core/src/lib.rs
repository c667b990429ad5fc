//! Domain layer for the rentdesk back-office: record types, request payload
//! validation and report aggregation shared by the storage and HTTP crates.

pub mod password;
pub mod payload;
pub mod reports;
pub mod types;
pub mod validation;

pub use payload::ValidationError;
