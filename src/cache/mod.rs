//! Mirror cache system.
//!
//! Cached documents are keyed by [`CacheKey`] and stored through a
//! [`CacheStore`] bound to a group and ttl by [`DocumentCache`]:
//!
//! - **Entity documents**: one Markdown rendering per entity
//! - **Index**: the `llms.txt` aggregate
//! - **Context documents**: basic and full variants derived from the index
//! - **Taxonomy archives**: per-term listings in a separate group
//!
//! Content mutations reach the [`InvalidationCoordinator`] through the
//! [`MutationBus`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! group = "md_mirror"
//! ttl_seconds = 86400
//! capacity = 1024
//! ```

mod config;
mod coordinator;
mod document;
mod events;
mod keys;
mod lock;
mod planner;
mod store;

pub use config::CacheConfig;
pub use coordinator::InvalidationCoordinator;
pub use document::DocumentCache;
pub use events::{
    EntityChange, Epoch, EventKind, MutationBus, MutationEvent, MutationHandler, SiteOption,
};
pub use keys::CacheKey;
pub use planner::InvalidationPlan;
pub use store::{CacheError, CacheStore, Clock, ManualClock, MemoryCacheStore, SystemClock};

pub(crate) use lock::{rw_read, rw_write};
