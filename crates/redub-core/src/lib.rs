//! Shared foundation for the redub pipeline: unified error type,
//! configuration schemas, and common request/response types.

pub mod config;
pub mod error;
pub mod result;
pub mod types;
