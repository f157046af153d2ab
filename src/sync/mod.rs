//! Reconciliation of the mirror against the remote tracker.
//!
//! One run moves through `Fetching -> Diffing -> Applying -> Completed`
//! (or `Failed`):
//!
//! 1. Fetch the descendant id set of the configured epic, then the payloads,
//!    in batches with bounded concurrency
//! 2. Classify against the mirrored id -> rev map ([`classify`])
//! 3. Apply added/updated/removed in one transaction
//! 4. Sync comments for touched items ([`CommentSync`])
//!
//! At most one run per sync config is in flight ([`RunRegistry`]). A run
//! cancelled before step 3 commits nothing.

mod bootstrap;
mod comments;
mod diff;
mod engine;
mod registry;

pub use bootstrap::default_config;
pub use comments::CommentSync;
pub use diff::{classify, normalize_parents, Classification};
pub use engine::{MirrorEvent, SyncEngine};
pub use registry::{RunGuard, RunRegistry, SyncPhase};
