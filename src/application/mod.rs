//! Document builders and the ports they depend on.

pub mod context;
pub mod convert;
pub mod error;
pub mod index;
pub mod markdown;
pub mod mirror;
pub mod repos;
pub mod taxonomy;

pub use mirror::{MirrorConfig, MirrorServices};
