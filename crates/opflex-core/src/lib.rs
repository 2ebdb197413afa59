//! Core concurrency abstractions shared by the translator modules.
//!
//! This crate provides the primitives used by every module of the
//! integration flow manager and its siblings (C1-C9):
//!
//! - [`Orch`]: base trait for a translator module
//! - [`UpdateQueue`] / [`Update`]: per-entity-URI task queue with coalescing
//! - [`SyncMap`]: type-safe map that prevents auto-vivification bugs
//! - [`RetryCache`]: dependency-retry cache for tasks waiting on another URI
//! - [`TaskStatus`]: result type for task processing
//!
//! # Architecture
//!
//! Each module follows the same event-driven shape:
//!
//! 1. MODB updates are resolved into typed `Update<T>` values by the policy
//!    resolver (C5).
//! 2. Each update is pushed onto an [`UpdateQueue`] keyed by entity `Uri`.
//! 3. The daemon's event loop dispatches ready entries to the owning
//!    module's `do_task()`.
//! 4. The module computes a flow/group edit list and hands it to the switch
//!    manager (C4) to apply.
//! 5. Tasks that fail due to an unresolved dependency are parked in a
//!    [`RetryCache`] until the dependency's URI resolves.
//!
//! # Example
//!
//! ```ignore
//! use opflex_core::{Orch, UpdateQueue, Update};
//!
//! struct MyModule {
//!     queue: UpdateQueue<MyEntity>,
//!     // ... state
//! }
//!
//! #[async_trait::async_trait]
//! impl Orch for MyModule {
//!     fn name(&self) -> &str { "MyModule" }
//!
//!     async fn do_task(&mut self) {
//!         for (uri, update) in self.queue.dispatch_ready() {
//!             match self.apply(&uri, update).await {
//!                 Ok(()) => self.queue.complete(&uri),
//!                 Err(e) if e.is_retryable() => self.queue.fail(&uri),
//!                 Err(e) => log::error!("{uri}: {e}"),
//!             }
//!         }
//!     }
//! }
//! ```

mod consumer;
mod orch;
mod queue;
mod retry;
mod sync_map;
mod task;

pub use orch::{Orch, OrchContext};
pub use queue::{Update, UpdateQueue};
pub use retry::{Constraint, RetryCache};
pub use sync_map::{HasRefCount, SyncMap, SyncMapError};
pub use task::{TaskError, TaskResult, TaskResultExt, TaskStatus};
