//! Switch Manager (C4): owns desired flow/group state and reconciles it
//! against the connection.
//!
//! Desired state is kept per owning entity URI so a module can replace
//! "everything I installed for this endpoint/EPG/contract" in one call
//! without needing to remember the individual flows it installed last time.
//! On every apply, the manager diffs the entity's new flow/group set against
//! its previous one and issues only the adds/deletes needed. On reconnect,
//! [`SwitchManager::reconcile`] reads the switch's full inventory and
//! produces a minimal edit list against the union of all entities' desired
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use opflex_types::Uri;

use crate::conn::SwitchConnection;
use crate::error::OvsResult;
use crate::flow::FlowEntry;
use crate::group::{buckets_equivalent, GroupEntry};
use crate::types::GroupId;

/// Running counters for observability.
#[derive(Debug, Clone, Default)]
pub struct SwitchManagerStats {
    pub flow_mods: u64,
    pub flow_deletes: u64,
    pub group_mods: u64,
    pub group_deletes: u64,
    pub reconciles: u64,
    pub reconcile_edits: u64,
}

/// Owns the desired flow/group state and applies it to a [`SwitchConnection`].
pub struct SwitchManager<C: SwitchConnection> {
    conn: Arc<C>,
    desired_flows: HashMap<Uri, Vec<FlowEntry>>,
    desired_groups: HashMap<Uri, Vec<GroupEntry>>,
    stats: SwitchManagerStats,
}

impl<C: SwitchConnection> SwitchManager<C> {
    pub fn new(conn: Arc<C>) -> Self {
        SwitchManager {
            conn,
            desired_flows: HashMap::new(),
            desired_groups: HashMap::new(),
            stats: SwitchManagerStats::default(),
        }
    }

    pub fn stats(&self) -> &SwitchManagerStats {
        &self.stats
    }

    /// Replaces the flow set owned by `owner`, diffing against what was
    /// previously installed for it and issuing only the changed entries.
    pub async fn apply_flows(&mut self, owner: Uri, flows: Vec<FlowEntry>) -> OvsResult<()> {
        let previous = self.desired_flows.remove(&owner).unwrap_or_default();

        let to_delete: Vec<&FlowEntry> = previous.iter().filter(|p| !flows.contains(p)).collect();
        let to_add: Vec<&FlowEntry> = flows.iter().filter(|f| !previous.contains(f)).collect();

        for flow in &to_delete {
            self.conn
                .delete_flow(flow.table, flow.cookie.as_u64(), u64::MAX)
                .await?;
            self.stats.flow_deletes += 1;
        }
        for flow in &to_add {
            self.conn.mod_flow(flow).await?;
            self.stats.flow_mods += 1;
        }

        self.desired_flows.insert(owner, flows);
        Ok(())
    }

    /// Removes every flow owned by `owner`.
    pub async fn withdraw_flows(&mut self, owner: &Uri) -> OvsResult<()> {
        if let Some(flows) = self.desired_flows.remove(owner) {
            for flow in &flows {
                self.conn
                    .delete_flow(flow.table, flow.cookie.as_u64(), u64::MAX)
                    .await?;
                self.stats.flow_deletes += 1;
            }
        }
        Ok(())
    }

    /// Replaces the group set owned by `owner`. Buckets are compared with
    /// [`buckets_equivalent`] so reordering alone never triggers a group-mod.
    pub async fn apply_groups(&mut self, owner: Uri, groups: Vec<GroupEntry>) -> OvsResult<()> {
        let previous = self.desired_groups.remove(&owner).unwrap_or_default();

        for group in &groups {
            let unchanged = previous
                .iter()
                .find(|p| p.id == group.id)
                .is_some_and(|p| p.group_type == group.group_type && buckets_equivalent(&p.buckets, &group.buckets));
            if !unchanged {
                self.conn.mod_group(group).await?;
                self.stats.group_mods += 1;
            }
        }
        for prev in &previous {
            if !groups.iter().any(|g| g.id == prev.id) {
                self.conn.delete_group(prev.id).await?;
                self.stats.group_deletes += 1;
            }
        }

        self.desired_groups.insert(owner, groups);
        Ok(())
    }

    /// Removes every group owned by `owner`.
    pub async fn withdraw_groups(&mut self, owner: &Uri) -> OvsResult<()> {
        if let Some(groups) = self.desired_groups.remove(owner) {
            for group in &groups {
                self.conn.delete_group(group.id).await?;
                self.stats.group_deletes += 1;
            }
        }
        Ok(())
    }

    fn all_desired_flows(&self) -> Vec<&FlowEntry> {
        self.desired_flows.values().flatten().collect()
    }

    fn all_desired_groups(&self) -> HashMap<GroupId, &GroupEntry> {
        self.desired_groups
            .values()
            .flatten()
            .map(|g| (g.id, g))
            .collect()
    }

    /// Reads the switch's current inventory and brings it in line with the
    /// union of all entities' desired state. Called once per (re)connect.
    pub async fn reconcile(&mut self) -> OvsResult<()> {
        self.stats.reconciles += 1;
        let observed = self.conn.read_inventory().await?;

        let desired_flows = self.all_desired_flows();
        for flow in &observed.flows {
            if !desired_flows.contains(&flow) {
                self.conn
                    .delete_flow(flow.table, flow.cookie.as_u64(), u64::MAX)
                    .await?;
                self.stats.reconcile_edits += 1;
            }
        }
        for flow in &desired_flows {
            if !observed.flows.contains(flow) {
                self.conn.mod_flow(flow).await?;
                self.stats.reconcile_edits += 1;
            }
        }

        let desired_groups = self.all_desired_groups();
        for group in &observed.groups {
            match desired_groups.get(&group.id) {
                Some(d) if d.group_type == group.group_type && buckets_equivalent(&d.buckets, &group.buckets) => {}
                Some(d) => {
                    self.conn.mod_group(d).await?;
                    self.stats.reconcile_edits += 1;
                }
                None => {
                    self.conn.delete_group(group.id).await?;
                    self.stats.reconcile_edits += 1;
                }
            }
        }
        let observed_ids: std::collections::HashSet<GroupId> = observed.groups.iter().map(|g| g.id).collect();
        for (id, group) in &desired_groups {
            if !observed_ids.contains(id) {
                self.conn.mod_group(group).await?;
                self.stats.reconcile_edits += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::FakeConnection;
    use crate::flow::FlowBuilder;
    use crate::group::{Bucket, GroupBuilder};
    use crate::types::{GroupType, TableId};
    use opflex_types::OfPort;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_apply_flows_installs_and_replaces() {
        let conn = Arc::new(FakeConnection::new());
        let mut mgr = SwitchManager::new(conn.clone());

        let f1 = FlowBuilder::new(TableId::Bridge).priority(1).build();
        mgr.apply_flows(uri("/ep/1"), vec![f1.clone()]).await.unwrap();
        assert_eq!(conn.flows().len(), 1);

        let f2 = FlowBuilder::new(TableId::Bridge).priority(2).build();
        mgr.apply_flows(uri("/ep/1"), vec![f2.clone()]).await.unwrap();
        let flows = conn.flows();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].priority, 2);
    }

    #[tokio::test]
    async fn test_withdraw_flows_removes_all() {
        let conn = Arc::new(FakeConnection::new());
        let mut mgr = SwitchManager::new(conn.clone());
        let f1 = FlowBuilder::new(TableId::Bridge).priority(1).build();
        mgr.apply_flows(uri("/ep/1"), vec![f1]).await.unwrap();

        mgr.withdraw_flows(&uri("/ep/1")).await.unwrap();
        assert!(conn.flows().is_empty());
    }

    #[tokio::test]
    async fn test_apply_groups_reorder_is_not_a_modify() {
        let conn = Arc::new(FakeConnection::new());
        let mut mgr = SwitchManager::new(conn.clone());

        let g = GroupBuilder::new(GroupId::new(1))
            .group_type(GroupType::All)
            .bucket(Bucket::output(OfPort::new(1)))
            .bucket(Bucket::output(OfPort::new(2)))
            .build();
        mgr.apply_groups(uri("/fd/1"), vec![g]).await.unwrap();
        assert_eq!(mgr.stats().group_mods, 1);

        let g_reordered = GroupBuilder::new(GroupId::new(1))
            .group_type(GroupType::All)
            .bucket(Bucket::output(OfPort::new(2)))
            .bucket(Bucket::output(OfPort::new(1)))
            .build();
        mgr.apply_groups(uri("/fd/1"), vec![g_reordered]).await.unwrap();
        assert_eq!(mgr.stats().group_mods, 1, "reorder alone shouldn't re-mod");
    }

    #[tokio::test]
    async fn test_reconcile_installs_missing_and_removes_stale() {
        let conn = Arc::new(FakeConnection::new());
        let mut mgr = SwitchManager::new(conn.clone());

        let f1 = FlowBuilder::new(TableId::Bridge).priority(1).build();
        mgr.apply_flows(uri("/ep/1"), vec![f1.clone()]).await.unwrap();

        // Simulate a switch that came back with a stale flow we no longer want.
        let stale = FlowBuilder::new(TableId::Route).priority(9).build();
        conn.mod_flow(&stale).await.unwrap();
        conn.mod_flow(&f1).await.unwrap();

        mgr.reconcile().await.unwrap();

        let flows = conn.flows();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].table, TableId::Bridge);
    }
}
