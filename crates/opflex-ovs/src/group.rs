//! Group-mod construction: flood groups and their bucket lists.
//!
//! A flood domain's group has one bucket per local endpoint access port plus
//! one bucket for the tunnel or uplink port carrying the domain's
//! encapsulation action. Buckets are otherwise anonymous — OVS assigns
//! bucket ids on install — so the desired state is just an ordered list.

use opflex_types::OfPort;

use crate::flow::Action;
use crate::types::{GroupId, GroupType};

/// One bucket in a group: an output port plus any actions to run first
/// (e.g. an encapsulation push for the tunnel bucket).
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub actions: Vec<Action>,
}

impl Bucket {
    pub fn output(port: OfPort) -> Self {
        Bucket {
            actions: vec![Action::Output(port)],
        }
    }

    pub fn with_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        Bucket {
            actions: actions.into_iter().collect(),
        }
    }
}

/// A fully constructed group entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub id: GroupId,
    pub group_type: GroupType,
    pub buckets: Vec<Bucket>,
}

/// Builder for a flood-domain group.
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    id: GroupId,
    group_type: GroupType,
    buckets: Vec<Bucket>,
}

impl GroupBuilder {
    pub fn new(id: GroupId) -> Self {
        GroupBuilder {
            id,
            group_type: GroupType::All,
            buckets: Vec::new(),
        }
    }

    pub fn group_type(mut self, group_type: GroupType) -> Self {
        self.group_type = group_type;
        self
    }

    pub fn bucket(mut self, bucket: Bucket) -> Self {
        self.buckets.push(bucket);
        self
    }

    pub fn buckets(mut self, buckets: impl IntoIterator<Item = Bucket>) -> Self {
        self.buckets.extend(buckets);
        self
    }

    pub fn build(self) -> GroupEntry {
        GroupEntry {
            id: self.id,
            group_type: self.group_type,
            buckets: self.buckets,
        }
    }
}

/// Returns true if two desired bucket lists differ only in bucket order,
/// which the switch manager should treat as "no change" since OVS doesn't
/// guarantee bucket ordering is preserved across a group-mod.
pub fn buckets_equivalent(a: &[Bucket], b: &[Bucket]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|x| b.contains(x))
}
