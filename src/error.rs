//! Error handling for codec operations
//!
//! This module re-exports the error type used throughout the crate. Every
//! failure surfaces to the caller; nothing is retried internally, and the
//! native engine handle is released before an error propagates.

pub use crate::common::CzlibError;
pub use crate::common::Result;
