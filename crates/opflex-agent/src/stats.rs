//! Table-Drop Stats Manager (C8): installs a priority-0 drop flow in every
//! pipeline table, polls per-flow counters filtered by the reserved
//! table-drop cookie, and aggregates packet/byte deltas into a per-table
//! rolling total.
//!
//! Per-flow state is tracked in three conceptual buckets, mirroring the
//! original implementation's age/removal handling: `new` (never polled
//! before, delta is the full counter), `old` (seen on a previous poll, delta
//! is the increase since then), and `removed` (retired via a flow-removed
//! notification before its final counters would otherwise have been lost to
//! age-out).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use opflex_core::Orch;
use opflex_ovs::conn::SwitchConnection;
use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_ovs::types::TableId;
use opflex_types::{Cookie, CookieClass};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;

/// Polls not observing a flow are treated as an eviction: its last known
/// counters are folded into the table total and the entry is dropped.
const MAX_AGE_POLLS: u32 = 10;

fn audit(category: AuditCategory, source: &str, action: impl Into<String>, outcome: AuditOutcome) {
    audit_log!(AuditRecord::new(category, source, action).with_outcome(outcome));
}

fn drop_cookie() -> Cookie {
    Cookie::reserved(CookieClass::TableDropFlow)
}

/// Builds the priority-0 drop flow installed in every pipeline table.
pub fn build_drop_flows() -> Vec<FlowEntry> {
    TableId::ALL
        .iter()
        .map(|&table| {
            FlowBuilder::new(table)
                .priority(0)
                .cookie(drop_cookie())
                .send_flow_removed()
                .action(Action::Drop)
                .build()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    packets: u64,
    bytes: u64,
}

struct Observed {
    last: Counters,
    age: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableDropCounters {
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlowKey {
    table: TableId,
    priority: u16,
    match_key: String,
}

pub struct TableDropStatsManager<C: SwitchConnection> {
    conn: Arc<C>,
    observed: HashMap<FlowKey, Observed>,
    totals: HashMap<TableId, TableDropCounters>,
    poll_due: bool,
}

impl<C: SwitchConnection> TableDropStatsManager<C> {
    pub fn new(conn: Arc<C>) -> Self {
        TableDropStatsManager {
            conn,
            observed: HashMap::new(),
            totals: HashMap::new(),
            poll_due: false,
        }
    }

    pub fn totals(&self) -> &HashMap<TableId, TableDropCounters> {
        &self.totals
    }

    fn retire(&mut self, key: &FlowKey) {
        if let Some(obs) = self.observed.remove(key) {
            let entry = self.totals.entry(key.table).or_default();
            entry.packets += obs.last.packets;
            entry.bytes += obs.last.bytes;
        }
    }

    async fn poll(&mut self) {
        let cookie = drop_cookie();
        let stats = match self.conn.flow_stats(cookie.as_u64(), u64::MAX).await {
            Ok(stats) => stats,
            Err(e) => {
                audit(AuditCategory::ErrorCondition, "stats", format!("drop-flow stats poll failed: {e}"), AuditOutcome::Failure);
                return;
            }
        };

        for obs in self.observed.values_mut() {
            obs.age += 1;
        }

        for stat in &stats {
            let key = FlowKey {
                table: stat.table,
                priority: stat.priority,
                match_key: stat.match_key.clone(),
            };
            let previous = self.observed.get(&key).map(|o| o.last).unwrap_or_default();
            let delta_packets = stat.packet_count.saturating_sub(previous.packets);
            let delta_bytes = stat.byte_count.saturating_sub(previous.byte_count);

            let total = self.totals.entry(stat.table).or_default();
            total.packets += delta_packets;
            total.bytes += delta_bytes;

            self.observed.insert(
                key,
                Observed {
                    last: Counters { packets: stat.packet_count, bytes: stat.byte_count },
                    age: 0,
                },
            );
        }

        let stale: Vec<FlowKey> = self.observed.iter().filter(|(_, o)| o.age >= MAX_AGE_POLLS).map(|(k, _)| k.clone()).collect();
        for key in stale {
            self.retire(&key);
        }
    }
}

#[async_trait]
impl<C: SwitchConnection + 'static> Orch for TableDropStatsManager<C> {
    fn name(&self) -> &str {
        "TableDropStatsManager"
    }

    async fn do_task(&mut self) {
        if self.poll_due {
            self.poll_due = false;
            self.poll().await;
        }
    }

    fn has_pending_tasks(&self) -> bool {
        self.poll_due
    }

    fn on_timer(&mut self) {
        self.poll_due = true;
    }

    /// A `flow-removed:<table-as-u8>:<priority>:<match_key>` notification
    /// retires that flow's last known counters immediately, rather than
    /// waiting out `MAX_AGE_POLLS` for a flow the switch has already evicted.
    fn on_notification(&mut self, notification: &str) {
        let Some(rest) = notification.strip_prefix("flow-removed:") else { return };
        let mut parts = rest.splitn(3, ':');
        let (Some(table_raw), Some(priority_raw), Some(match_key)) = (parts.next(), parts.next(), parts.next()) else {
            return;
        };
        let (Ok(table_id), Ok(priority)) = (table_raw.parse::<u8>(), priority_raw.parse::<u16>()) else {
            return;
        };
        let Some(table) = TableId::from_u8(table_id) else { return };
        self.retire(&FlowKey { table, priority, match_key: match_key.to_string() });
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        self.totals.iter().map(|(table, c)| format!("{table}: packets={} bytes={}", c.packets, c.bytes)).collect()
    }

    fn priority(&self) -> i32 {
        30
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflex_ovs::conn::FakeConnection;
    use opflex_types::OfPort;

    fn flow_in(table: TableId) -> FlowEntry {
        FlowBuilder::new(table).priority(0).cookie(drop_cookie()).in_port(OfPort::new(1)).action(Action::Drop).build()
    }

    #[tokio::test]
    async fn test_poll_accumulates_deltas() {
        let conn = Arc::new(FakeConnection::new());
        let flow = flow_in(TableId::Sec);
        conn.mod_flow(&flow).await.unwrap();
        let key = opflex_ovs::conn::match_key(&flow);

        let mut mgr = TableDropStatsManager::new(conn.clone());
        conn.set_counters(&key, 10, 1000);
        mgr.on_timer();
        mgr.do_task().await;
        assert_eq!(mgr.totals()[&TableId::Sec].packets, 10);

        conn.set_counters(&key, 25, 2500);
        mgr.on_timer();
        mgr.do_task().await;
        assert_eq!(mgr.totals()[&TableId::Sec].packets, 25);
        assert_eq!(mgr.totals()[&TableId::Sec].bytes, 2500);
    }

    #[tokio::test]
    async fn test_has_pending_only_after_timer() {
        let conn = Arc::new(FakeConnection::new());
        let mgr = TableDropStatsManager::new(conn);
        assert!(!mgr.has_pending_tasks());
    }

    #[test]
    fn test_flow_removed_notification_retires_entry() {
        let conn = Arc::new(FakeConnection::new());
        let mut mgr = TableDropStatsManager::new(conn);
        let key = FlowKey { table: TableId::Bridge, priority: 0, match_key: "m".into() };
        mgr.observed.insert(key, Observed { last: Counters { packets: 5, bytes: 500 }, age: 0 });

        mgr.on_notification("flow-removed:5:0:m");
        assert_eq!(mgr.totals()[&TableId::Bridge].packets, 5);
        assert!(mgr.observed.is_empty());
    }

    #[test]
    fn test_build_drop_flows_covers_every_table() {
        let flows = build_drop_flows();
        assert_eq!(flows.len(), TableId::ALL.len());
        assert!(flows.iter().all(|f| f.priority == 0 && f.cookie == drop_cookie()));
    }
}
