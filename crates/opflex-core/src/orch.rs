//! Base Orch trait and context.

use async_trait::async_trait;

/// Context shared across all Orch modules.
///
/// This provides access to shared state and coordination primitives
/// that multiple Orchs may need to access.
#[derive(Debug, Clone)]
pub struct OrchContext {
    /// Flag indicating if all ports are ready
    pub all_ports_ready: bool,
    /// Flag indicating if warm boot is in progress
    pub warm_boot_in_progress: bool,
    /// Flag indicating if the system is healthy
    pub system_healthy: bool,
}

impl Default for OrchContext {
    fn default() -> Self {
        Self {
            all_ports_ready: false,
            warm_boot_in_progress: false,
            system_healthy: true,
        }
    }
}

/// Base trait for all translator modules (C1-C9).
///
/// Each module implements this trait to participate in the daemon's event
/// loop. The daemon calls these methods in response to MODB updates queued
/// on the module's [`crate::UpdateQueue`]s and timer events.
///
/// # Lifecycle
///
/// 1. Construction: module is created with its switch connection handle
/// 2. Registration: module registers its update queues with the daemon
/// 3. Event Loop: `do_task()` is called when data is available
/// 4. Reconnect: `bake()` and `on_warm_boot_end()` handle state recovery
/// 5. Shutdown: module is dropped (cleanup via Drop trait)
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow for potential concurrent
/// access from the daemon and notification handlers.
#[async_trait]
pub trait Orch: Send + Sync {
    /// Returns the name of this Orch (for logging and debugging).
    fn name(&self) -> &str;

    /// Processes pending tasks from all of this module's update queues.
    ///
    /// This is the main entry point called by the daemon when data is
    /// available on any queue this module owns.
    ///
    /// Implementations should:
    /// 1. Drain ready entries via `UpdateQueue::dispatch_ready`
    /// 2. Process each entry (recompute the flow set, call the switch manager)
    /// 3. Handle errors appropriately (retry, log, etc.)
    async fn do_task(&mut self);

    /// Prepares for a switch reconnect by saving state.
    ///
    /// Called before the switch manager reconciles against the switch's
    /// full flow/group inventory, to allow the module to save any state
    /// needed to compute its desired set.
    ///
    /// Returns `true` if preparation was successful.
    fn bake(&mut self) -> bool {
        true
    }

    /// Called once the switch manager's reconnect reconciliation has
    /// completed.
    ///
    /// This is the signal that switch state has been restored and the
    /// module can resume normal operation.
    fn on_warm_boot_end(&mut self) {
        // Default: no-op
    }

    /// Returns the priority of this module (lower = higher priority).
    ///
    /// Modules with lower priority values are processed first.
    /// Default is 0 (highest priority).
    fn priority(&self) -> i32 {
        0
    }

    /// Returns true if this module has pending work.
    ///
    /// Used by the daemon to determine if `do_task()` should be called.
    fn has_pending_tasks(&self) -> bool {
        false
    }

    /// Dumps pending tasks for debugging.
    ///
    /// Returns a list of human-readable strings describing pending work.
    fn dump_pending_tasks(&self) -> Vec<String> {
        vec![]
    }

    /// Called periodically by the daemon's timer.
    ///
    /// Modules can use this for periodic maintenance tasks (e.g. the
    /// advertisement manager's scheduled gratuitous ARP/ND).
    fn on_timer(&mut self) {
        // Default: no-op
    }

    /// Handles an asynchronous notification from the switch connection.
    ///
    /// Override this to handle events like port status changes.
    fn on_notification(&mut self, _notification: &str) {
        // Default: no-op
    }
}

/// Trait for Orchs that follow the simplified request-based pattern.
///
/// This is an alternative to the base Orch trait that provides a more
/// structured interface for processing add/delete operations.
#[async_trait]
pub trait Orch2: Orch {
    /// The request type this Orch processes.
    type Request;

    /// Processes an add operation.
    ///
    /// Called when a SET operation is received for a key.
    async fn add_operation(&mut self, request: &Self::Request) -> crate::TaskResult<()>;

    /// Processes a delete operation.
    ///
    /// Called when a DEL operation is received for a key.
    async fn del_operation(&mut self, request: &Self::Request) -> crate::TaskResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestOrch {
        name: String,
        task_count: usize,
    }

    #[async_trait]
    impl Orch for TestOrch {
        fn name(&self) -> &str {
            &self.name
        }

        async fn do_task(&mut self) {
            self.task_count += 1;
        }

        fn has_pending_tasks(&self) -> bool {
            self.task_count < 10
        }
    }

    #[tokio::test]
    async fn test_orch_trait() {
        let mut orch = TestOrch {
            name: "test".to_string(),
            task_count: 0,
        };

        assert_eq!(orch.name(), "test");
        assert!(orch.has_pending_tasks());
        assert!(orch.bake());

        orch.do_task().await;
        assert_eq!(orch.task_count, 1);
    }

    #[test]
    fn test_orch_context_default() {
        let ctx = OrchContext::default();
        assert!(!ctx.all_ports_ready);
        assert!(!ctx.warm_boot_in_progress);
        assert!(ctx.system_healthy);
    }
}
