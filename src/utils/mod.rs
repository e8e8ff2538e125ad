//! Shared utilities

pub mod logger;
pub mod retry;
