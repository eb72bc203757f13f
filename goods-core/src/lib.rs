//! Goods Core - Entity Types
//!
//! Pure data structures shared by every crate in the workspace: the `Good`
//! entity, pagination, change events, audit rows and the error taxonomy.
//! Store adapters and the orchestration service live in other crates.

use chrono::{DateTime, Utc};

pub mod entities;
pub mod error;
pub mod event;
pub mod priority;

pub use entities::{Good, GoodPatch, GoodsMeta, GoodsPage, Pagination, PriorityChange};
pub use error::{GoodsError, GoodsResult, StorageError};
pub use event::{ChangeEvent, ChangeKind, LogEntry};
pub use priority::{next_priority, shift_priorities};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Identifier of a good, assigned by the relational store.
///
/// Ids are monotonically increasing and double as the total-order key used
/// by reprioritization.
pub type GoodId = i64;

/// Identifier of the project owning a good.
pub type ProjectId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// SHARED CONSTANTS
// ============================================================================

/// Key under which the full goods snapshot is cached.
pub const SNAPSHOT_CACHE_KEY: &str = "goods:snapshot";

/// Subject carrying change events on the message bus.
pub const CHANGES_SUBJECT: &str = "goods.changes";

/// Default snapshot time-to-live in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Default number of audit rows accumulated before a flush.
pub const DEFAULT_LOG_BATCH_SIZE: usize = 25;

/// Default page size when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Upper bound for a single page.
pub const MAX_PAGE_LIMIT: u32 = 1000;
