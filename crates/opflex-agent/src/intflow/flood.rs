//! Flood-group construction for flood domains, plus the membership
//! tracking that enforces "an endpoint is in at most one flood-group
//! bucket list at a time".

use std::collections::HashMap;

use opflex_ovs::group::{Bucket, GroupBuilder, GroupEntry};
use opflex_ovs::types::{GroupId, GroupType};
use opflex_types::{OfPort, Uri};

use super::tables::to_std_ip;
use crate::policy::types::FloodMembership;
use opflex_ovs::flow::Action;
use opflex_types::IpAddress;

/// Tracks which flood domain each endpoint currently belongs to, so a
/// transition can remove the endpoint from its previous domain's bucket
/// list before adding it to the new one.
#[derive(Debug, Default)]
pub struct FloodMembershipTracker {
    /// fd URI -> member endpoint URIs.
    members: HashMap<Uri, FloodMembership>,
    /// endpoint URI -> the fd it currently belongs to, if any.
    current_fd: HashMap<Uri, Uri>,
}

impl FloodMembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `endpoint` into `fd`'s membership set, removing it from any fd
    /// it previously belonged to. Returns the set of fd URIs whose bucket
    /// list needs recomputing as a result (at most two: old and new).
    pub fn set_membership(&mut self, endpoint: &Uri, fd: &Uri) -> Vec<Uri> {
        let mut dirty = Vec::new();
        if let Some(old_fd) = self.current_fd.get(endpoint).cloned() {
            if &old_fd == fd {
                return dirty;
            }
            if let Some(set) = self.members.get_mut(&old_fd) {
                set.remove(endpoint);
            }
            dirty.push(old_fd);
        }
        self.members.entry(fd.clone()).or_default().insert(endpoint.clone());
        self.current_fd.insert(endpoint.clone(), fd.clone());
        dirty.push(fd.clone());
        dirty
    }

    pub fn remove(&mut self, endpoint: &Uri) -> Option<Uri> {
        let fd = self.current_fd.remove(endpoint)?;
        if let Some(set) = self.members.get_mut(&fd) {
            set.remove(endpoint);
        }
        Some(fd)
    }

    pub fn members_of(&self, fd: &Uri) -> FloodMembership {
        self.members.get(fd).cloned().unwrap_or_default()
    }
}

/// Builds the desired bucket list for one flood domain: one output bucket
/// per local access port, plus an encapsulating bucket for the tunnel port
/// when any member is reachable only through the fabric.
pub fn build_flood_group(group_id: GroupId, local_ports: &[OfPort], tunnel_port: Option<OfPort>, tunnel_dst: Option<IpAddress>, tun_id: u32) -> GroupEntry {
    let mut builder = GroupBuilder::new(group_id).group_type(GroupType::All);
    for port in local_ports {
        builder = builder.bucket(Bucket::output(*port));
    }
    if let (Some(port), Some(dst)) = (tunnel_port, tunnel_dst) {
        builder = builder.bucket(Bucket::with_actions([
            Action::EncapVxlan { tun_id, dst: to_std_ip(dst) },
            Action::Output(port),
        ]));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_membership_transition_dirties_both_domains() {
        let mut tracker = FloodMembershipTracker::new();
        tracker.set_membership(&uri("/ep1/"), &uri("/fd1/"));
        let dirty = tracker.set_membership(&uri("/ep1/"), &uri("/fd2/"));
        assert_eq!(dirty.len(), 2);
        assert!(tracker.members_of(&uri("/fd1/")).is_empty());
        assert!(tracker.members_of(&uri("/fd2/")).contains(&uri("/ep1/")));
    }

    #[test]
    fn test_same_domain_reassignment_is_not_dirty() {
        let mut tracker = FloodMembershipTracker::new();
        tracker.set_membership(&uri("/ep1/"), &uri("/fd1/"));
        let dirty = tracker.set_membership(&uri("/ep1/"), &uri("/fd1/"));
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_build_flood_group_has_one_bucket_per_local_port_plus_tunnel() {
        let group = build_flood_group(
            GroupId::new(10),
            &[OfPort::new(3), OfPort::new(4)],
            Some(OfPort::new(9)),
            Some("224.1.1.1".parse().unwrap()),
            1234,
        );
        assert_eq!(group.buckets.len(), 3);
    }
}
