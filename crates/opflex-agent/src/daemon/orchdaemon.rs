//! OrchDaemon implementation.
//!
//! The OrchDaemon is the central coordinator for all Orch modules. It
//! manages:
//! - Orch registration and priority ordering
//! - Task dispatch to appropriate Orchs
//! - Warm restart coordination
//! - The stop/reload signal plumbing described in §9 (SIGINT vs. config
//!   reload are two independent conditions, not one overloaded one)

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use log::{debug, error, info};
use opflex_core::{Orch, OrchContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Configuration for the OrchDaemon.
#[derive(Debug, Clone)]
pub struct OrchDaemonConfig {
    /// Heartbeat interval between `on_timer()` sweeps.
    pub heartbeat_interval_ms: u64,
    /// Enable warm boot mode.
    pub warm_boot: bool,
}

impl Default for OrchDaemonConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            warm_boot: false,
        }
    }
}

/// Signal the daemon reacts to: a clean stop request or a config reload.
/// Kept as two independent `watch` channels rather than one enum so a
/// reload can never be mistaken for (or swallowed by) a stop.
pub struct DaemonSignals {
    pub stop_rx: watch::Receiver<bool>,
    pub reload_rx: watch::Receiver<u64>,
}

/// The main orchestration daemon.
///
/// Coordinates all registered Orchs and runs the main event loop.
pub struct OrchDaemon {
    config: OrchDaemonConfig,
    /// Registered Orchs sorted by priority (lower runs first).
    orchs: BTreeMap<i32, Vec<Box<dyn Orch>>>,
    context: Arc<RwLock<OrchContext>>,
    running: bool,
}

impl OrchDaemon {
    pub fn new(config: OrchDaemonConfig) -> Self {
        Self {
            config,
            orchs: BTreeMap::new(),
            context: Arc::new(RwLock::new(OrchContext::default())),
            running: false,
        }
    }

    /// Registers an Orch with the daemon. Orchs are ordered by priority
    /// (lower = higher priority, runs first within a heartbeat).
    pub fn register_orch(&mut self, orch: Box<dyn Orch>) {
        let priority = orch.priority();
        let orch_name = orch.name().to_string();
        info!("Registering {} with priority {}", orch_name, priority);

        audit_log!(AuditRecord::new(
            AuditCategory::ResourceCreate,
            "OrchDaemon",
            format!("register_orch: {}", orch_name),
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(&orch_name)
        .with_object_type("orch_module")
        .with_details(serde_json::json!({ "priority": priority })));

        self.orchs.entry(priority).or_default().push(orch);
    }

    pub fn context(&self) -> Arc<RwLock<OrchContext>> {
        Arc::clone(&self.context)
    }

    /// Marks the daemon ready to begin its event loop. Switch connection
    /// and policy-store warmup happen before this is called, by whoever
    /// constructs and registers the Orchs.
    pub async fn init(&mut self) -> bool {
        info!(
            "Initializing OrchDaemon with {} orch groups",
            self.orchs.len()
        );

        audit_log!(AuditRecord::new(
            AuditCategory::SystemLifecycle,
            "OrchDaemon",
            "daemon_initialization",
        )
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({ "orch_count": self.orchs.len() })));

        let mut ctx = self.context.write().await;
        ctx.system_healthy = true;
        true
    }

    /// Runs the main event loop until `signals.stop_rx` observes `true`.
    /// Each heartbeat tick sweeps every registered Orch, dispatching
    /// `do_task()` where work is pending and `on_timer()` unconditionally;
    /// a reload signal triggers `on_notification("reload")` on every Orch
    /// before the next sweep.
    pub async fn run(&mut self, mut signals: DaemonSignals) {
        info!("Starting OrchDaemon event loop");
        self.running = true;

        audit_log!(AuditRecord::new(
            AuditCategory::AdminAction,
            "OrchDaemon",
            "event_loop_started",
        )
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({
            "heartbeat_interval_ms": self.config.heartbeat_interval_ms,
            "orch_count": self.orchs.len(),
        })));

        let mut heartbeat = tokio::time::interval(Duration::from_millis(self.config.heartbeat_interval_ms));
        let mut last_reload = *signals.reload_rx.borrow();

        while self.running {
            tokio::select! {
                _ = heartbeat.tick() => {
                    self.sweep().await;
                }
                changed = signals.reload_rx.changed() => {
                    if changed.is_ok() {
                        let gen = *signals.reload_rx.borrow();
                        if gen != last_reload {
                            last_reload = gen;
                            info!("Config reload signalled, notifying Orchs");
                            self.notify_all("reload").await;
                        }
                    }
                }
                changed = signals.stop_rx.changed() => {
                    if changed.is_ok() && *signals.stop_rx.borrow() {
                        self.stop();
                    }
                }
            }
        }

        info!("OrchDaemon event loop stopped");
        audit_log!(
            AuditRecord::new(AuditCategory::AdminAction, "OrchDaemon", "event_loop_stopped")
                .with_outcome(AuditOutcome::Success)
        );
    }

    async fn sweep(&mut self) {
        for (_priority, orchs) in self.orchs.iter_mut() {
            for orch in orchs.iter_mut() {
                orch.on_timer();
                if orch.has_pending_tasks() {
                    debug!("Processing tasks for {}", orch.name());
                    orch.do_task().await;
                }
            }
        }
    }

    async fn notify_all(&mut self, event: &str) {
        for (_priority, orchs) in self.orchs.iter_mut() {
            for orch in orchs.iter_mut() {
                orch.on_notification(event);
            }
        }
    }

    pub fn stop(&mut self) {
        info!("Stopping OrchDaemon");
        audit_log!(
            AuditRecord::new(AuditCategory::AdminAction, "OrchDaemon", "stop_requested")
                .with_outcome(AuditOutcome::Success)
        );
        self.running = false;
    }

    /// Prepares for warm boot: each Orch confirms it can restore state
    /// without a full resync.
    pub async fn prepare_warm_boot(&mut self) -> bool {
        info!("Preparing for warm boot");
        audit_log!(
            AuditRecord::new(AuditCategory::WarmRestart, "OrchDaemon", "warm_boot_preparation_start")
                .with_outcome(AuditOutcome::InProgress)
        );

        for (_priority, orchs) in self.orchs.iter_mut() {
            for orch in orchs.iter_mut() {
                if !orch.bake() {
                    error!("Failed to bake {}", orch.name());
                    audit_log!(AuditRecord::new(
                        AuditCategory::WarmRestart,
                        "OrchDaemon",
                        format!("warm_boot_preparation_failed: {}", orch.name()),
                    )
                    .with_outcome(AuditOutcome::Failure)
                    .with_error(format!("Failed to bake {}", orch.name())));
                    return false;
                }
            }
        }

        audit_log!(
            AuditRecord::new(AuditCategory::WarmRestart, "OrchDaemon", "warm_boot_preparation_complete")
                .with_outcome(AuditOutcome::Success)
        );
        true
    }

    /// Called after warm boot APPLY_VIEW: every Orch reconciles desired
    /// state against the switch's actual inventory.
    pub async fn on_warm_boot_end(&mut self) {
        info!("Warm boot ended, resuming normal operation");
        audit_log!(
            AuditRecord::new(AuditCategory::WarmRestart, "OrchDaemon", "warm_boot_ended")
                .with_outcome(AuditOutcome::Success)
        );

        for (_priority, orchs) in self.orchs.iter_mut() {
            for orch in orchs.iter_mut() {
                orch.on_warm_boot_end();
            }
        }

        let mut ctx = self.context.write().await;
        ctx.warm_boot_in_progress = false;
    }

    /// Dumps state for debugging.
    pub fn dump(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("OrchDaemon running: {}", self.running));

        for (priority, orchs) in &self.orchs {
            for orch in orchs {
                lines.push(format!(
                    "  [{:3}] {} - {} pending",
                    priority,
                    orch.name(),
                    orch.dump_pending_tasks().len()
                ));
            }
        }

        lines
    }
}
