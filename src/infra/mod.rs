//! Infrastructure adapters and runtime bootstrap.

pub mod content;
pub mod convert;
pub mod error;
pub mod http;
pub mod telemetry;
