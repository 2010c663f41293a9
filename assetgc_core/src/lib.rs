//! # assetgc Core
//!
//! Garbage collection for media assets that nothing refers to any more.
//!
//! The collector walks a folder tree in a hierarchical content store, checks
//! every asset against the store's reference index and a retention window,
//! and deletes the unused ones together with their blobs. Deletions are
//! committed in fixed-size batches and a run can be stopped cooperatively at
//! any page boundary without leaving queued work behind.
//!
//! ## Features
//!
//! - Paged, depth-first walk that never materializes the whole tree
//! - Version-independent identity for dedup and parent matching
//! - Batched deletion with best-effort blob cleanup
//! - Thread-safe stop token
//! - Collaborator traits with in-memory and directory-backed implementations
//!
//! ## Example
//!
//! ```no_run
//! use assetgc_core::{Collector, LocalStore, Locale, LogProgress};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = LocalStore::open("./assetgc-store")?;
//! let config = store.config()?;
//!
//! let collector = Collector::new(&store, &store, &store)
//!     .with_config(config)
//!     .with_progress(&LogProgress);
//!
//! let summary = collector.execute(&store.root_folder(), &Locale::invariant())?;
//! println!("{}", summary.message());
//! # Ok(())
//! # }
//! ```

mod batch;
mod config;
mod content;
mod eligibility;
mod error;
mod gc;
mod id;
mod local;
mod memory;
mod stop;
mod store;
mod walk;

pub use batch::{BatchDeleter, FlushStats};
pub use config::{
    DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, DEFAULT_RETENTION_DAYS, GcConfig, MAX_RETENTION_DAYS,
};
pub use content::{Asset, ContentItem, ContentKind, Folder, LinkRecord, Locale};
pub use eligibility::is_eligible;
pub use error::{Error, Result};
pub use gc::{Collector, RunState, RunSummary};
pub use id::{ContainerKey, ContentId, LINK_ID_SIZE, LinkId};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use stop::StopToken;
pub use store::{BlobStore, ContentStore, LinkIndex, LogProgress, NullProgress, ProgressSink};
pub use walk::{AssetWalker, walk};
