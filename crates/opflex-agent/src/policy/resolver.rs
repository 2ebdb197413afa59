//! Policy Resolver (C5): maintains derived views over the MODB and emits
//! typed update notifications to the Integration Flow Manager.
//!
//! Grounded on the teacher's typed-object + derived-index pattern (closest
//! analogue: `RouteOrch`'s `NextHopGroupKey` derivation from route state) —
//! generalized from one derived key per route to one derived
//! `GroupForwardingInfo` per EPG, backed by the same "explicit map, no
//! auto-vivification" discipline via [`opflex_core::SyncMap`].

use opflex_core::SyncMap;
use opflex_types::Uri;

use crate::idgen::{IdGenerator, IdNamespace};
use crate::policy::types::{
    BridgeDomain, Contract, EndpointGroup, EnforcementPreference, FloodDomain,
    GroupForwardingInfo, PolicyRule, RoutingDomain,
};

/// Typed notifications the resolver emits on every MODB-observed change, one
/// per the list in the component design.
#[derive(Debug, Clone)]
pub enum PolicyUpdate {
    EndpointUpdated(Uri),
    EpgUpdated(Uri),
    BdUpdated(Uri),
    FdUpdated(Uri),
    RdUpdated(Uri),
    ContractUpdated(Uri),
    ServiceUpdated(String),
    SnatUpdated(String),
    RemoteEndpointUpdated(String),
    ConfigUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NotReady,
}

/// A single expanded policy rule, ready for C6 to turn into flows: a
/// contract's rules already collapsed for bidirectionality and ordered by
/// descending priority.
#[derive(Debug, Clone)]
pub struct ExpandedRule {
    pub rule: PolicyRule,
    pub priority: u16,
}

/// Maintains derived views (EPG forwarding info, expanded contract rule
/// lists) over whatever the MODB currently reports, plus the id generator
/// used to make those derivations stable.
pub struct PolicyResolver {
    ids: IdGenerator,
    epgs: SyncMap<Uri, EndpointGroup>,
    bds: SyncMap<Uri, BridgeDomain>,
    fds: SyncMap<Uri, FloodDomain>,
    rds: SyncMap<Uri, RoutingDomain>,
    contracts: SyncMap<Uri, Contract>,
}

impl PolicyResolver {
    pub fn new() -> Self {
        PolicyResolver {
            ids: IdGenerator::new(),
            epgs: SyncMap::new(),
            bds: SyncMap::new(),
            fds: SyncMap::new(),
            rds: SyncMap::new(),
            contracts: SyncMap::new(),
        }
    }

    pub fn upsert_epg(&mut self, epg: EndpointGroup) {
        self.epgs.insert(epg.uri.clone(), epg);
    }

    pub fn remove_epg(&mut self, uri: &Uri) {
        self.epgs.remove(uri);
    }

    pub fn upsert_bd(&mut self, bd: BridgeDomain) {
        self.bds.insert(bd.uri.clone(), bd);
    }

    pub fn upsert_fd(&mut self, fd: FloodDomain) {
        self.fds.insert(fd.uri.clone(), fd);
    }

    pub fn upsert_rd(&mut self, rd: RoutingDomain) {
        self.rds.insert(rd.uri.clone(), rd);
    }

    pub fn upsert_contract(&mut self, contract: Contract) {
        self.contracts.insert(contract.uri.clone(), contract);
    }

    pub fn rd(&self, uri: &Uri) -> Option<&RoutingDomain> {
        self.rds.get(uri)
    }

    /// Computes `(vnid, rdId, bdId, fdId)` for an EPG, allocating ids as
    /// needed. Returns [`ResolveError::NotReady`] if the EPG is unknown or
    /// missing a required BD/FD/RD reference (an `MODBInvariant` case at the
    /// caller, which should skip the object and log a warning rather than
    /// propagate).
    pub fn group_forwarding_info(&mut self, epg_uri: &Uri) -> Result<GroupForwardingInfo, ResolveError> {
        let epg = self.epgs.get(epg_uri).ok_or(ResolveError::NotReady)?.clone();
        let vnid = epg.vnid.ok_or(ResolveError::NotReady)?;
        let bd = epg.bd.as_ref().ok_or(ResolveError::NotReady)?;
        let fd = epg.fd.as_ref().ok_or(ResolveError::NotReady)?;
        let rd = epg.rd.as_ref().ok_or(ResolveError::NotReady)?;

        let bd_id = self.ids.get_id(IdNamespace::BridgeDomain, bd.as_str());
        let fd_id = self.ids.get_id(IdNamespace::FloodDomain, fd.as_str());
        let rd_id = self.ids.get_id(IdNamespace::RoutingDomain, rd.as_str());

        Ok(GroupForwardingInfo { vnid, rd_id, bd_id, fd_id })
    }

    /// Allocates an external-network vnid with bit 31 set, distinguishing it
    /// from an ordinary EPG vnid allocated through the same id space.
    pub fn external_network_vnid(&mut self, uri: &Uri) -> opflex_types::Vnid {
        let id = self.ids.get_id(IdNamespace::ExternalNetwork, uri.as_str());
        opflex_types::Vnid::from_raw(id | opflex_types::Vnid::EXTERNAL_BIT)
    }

    /// True if `rd`'s enforcement preference is `unenforced`, in which case
    /// C6 must install one "allow all within rd" flow above contract rules.
    pub fn rd_is_unenforced(&self, rd_uri: &Uri) -> bool {
        self.rds
            .get(rd_uri)
            .map(|rd| rd.enforcement == EnforcementPreference::Unenforced)
            .unwrap_or(false)
    }

    /// Expands a contract's rules into a priority-ordered list, applying
    /// bidirectional collapse when `provider` and `consumer` are each
    /// other's provider+consumer for this contract (both EPGs provide AND
    /// consume it): a bidirectional rule then produces flows in only one
    /// direction.
    pub fn expand_contract(
        &self,
        contract_uri: &Uri,
        provider: &Uri,
        consumer: &Uri,
    ) -> Result<Vec<ExpandedRule>, ResolveError> {
        let contract = self.contracts.get(contract_uri).ok_or(ResolveError::NotReady)?;
        let provider_epg = self.epgs.get(provider).ok_or(ResolveError::NotReady)?;
        let consumer_epg = self.epgs.get(consumer).ok_or(ResolveError::NotReady)?;

        let collapse_bidirectional = provider_epg.provider_contracts.contains(contract_uri)
            && provider_epg.consumer_contracts.contains(contract_uri)
            && consumer_epg.provider_contracts.contains(contract_uri)
            && consumer_epg.consumer_contracts.contains(contract_uri);

        let mut out = Vec::new();
        let mut seen_bidirectional = false;
        let max_priority: u16 = 60000;
        for rule in &contract.rules {
            use crate::policy::types::RuleDirection;
            if rule.direction == RuleDirection::Bidirectional && collapse_bidirectional {
                if seen_bidirectional {
                    continue;
                }
                seen_bidirectional = true;
            }
            let priority = max_priority.saturating_sub(rule.order as u16);
            out.push(ExpandedRule { rule: rule.clone(), priority });
        }
        out.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(out)
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::{
        ArpMode, EnforcementPreference, FloodMode, IntraGroupPolicy, NdMode, RuleAction,
        RuleDirection,
    };
    use opflex_types::Vnid;
    use pretty_assertions::assert_eq;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn sample_resolver() -> PolicyResolver {
        let mut r = PolicyResolver::new();
        r.upsert_bd(BridgeDomain { uri: uri("/bd/") });
        r.upsert_fd(FloodDomain {
            uri: uri("/fd/"),
            bd: uri("/bd/"),
            arp_mode: ArpMode::Unicast,
            nd_mode: NdMode::Unicast,
            unknown_flood_mode: FloodMode::Flood,
            bcast_flood_mode: FloodMode::Flood,
        });
        r.upsert_rd(RoutingDomain {
            uri: uri("/rd/"),
            enforcement: EnforcementPreference::Enforced,
            internal_subnets: vec![],
        });
        r.upsert_epg(EndpointGroup {
            uri: uri("/g1/"),
            bd: Some(uri("/bd/")),
            fd: Some(uri("/fd/")),
            rd: Some(uri("/rd/")),
            vnid: Some(Vnid::new(1234).unwrap()),
            multicast_ip: None,
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![],
            consumer_contracts: vec![],
            intra_contracts: vec![],
            nat_epg: None,
        });
        r
    }

    #[test]
    fn test_group_forwarding_info_is_pure_and_stable() {
        let mut r = sample_resolver();
        let a = r.group_forwarding_info(&uri("/g1/")).unwrap();
        let b = r.group_forwarding_info(&uri("/g1/")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.vnid, Vnid::new(1234).unwrap());
    }

    #[test]
    fn test_group_forwarding_info_not_ready_without_rd() {
        let mut r = PolicyResolver::new();
        r.upsert_epg(EndpointGroup {
            uri: uri("/g2/"),
            bd: Some(uri("/bd/")),
            fd: Some(uri("/fd/")),
            rd: None,
            vnid: Some(Vnid::new(1).unwrap()),
            multicast_ip: None,
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![],
            consumer_contracts: vec![],
            intra_contracts: vec![],
            nat_epg: None,
        });
        assert_eq!(r.group_forwarding_info(&uri("/g2/")), Err(ResolveError::NotReady));
    }

    #[test]
    fn test_external_network_vnid_has_external_bit() {
        let mut r = PolicyResolver::new();
        let vnid = r.external_network_vnid(&uri("/ext/"));
        assert!(vnid.is_external());
    }

    #[test]
    fn test_rd_unenforced_detection() {
        let mut r = PolicyResolver::new();
        r.upsert_rd(RoutingDomain {
            uri: uri("/rd2/"),
            enforcement: EnforcementPreference::Unenforced,
            internal_subnets: vec![],
        });
        assert!(r.rd_is_unenforced(&uri("/rd2/")));
        assert!(!r.rd_is_unenforced(&uri("/missing/")));
    }

    #[test]
    fn test_expand_contract_orders_by_descending_priority() {
        let mut r = PolicyResolver::new();
        r.upsert_epg(EndpointGroup {
            uri: uri("/g1/"),
            bd: None,
            fd: None,
            rd: None,
            vnid: Some(Vnid::new(1).unwrap()),
            multicast_ip: None,
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![],
            consumer_contracts: vec![],
            intra_contracts: vec![],
            nat_epg: None,
        });
        r.upsert_epg(EndpointGroup {
            uri: uri("/g2/"),
            bd: None,
            fd: None,
            rd: None,
            vnid: Some(Vnid::new(2).unwrap()),
            multicast_ip: None,
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![],
            consumer_contracts: vec![],
            intra_contracts: vec![],
            nat_epg: None,
        });
        r.upsert_contract(Contract {
            uri: uri("/c1/"),
            rules: vec![
                PolicyRule {
                    uri: uri("/c1/r0/"),
                    direction: RuleDirection::Bidirectional,
                    action: RuleAction::Allow,
                    order: 0,
                    classifier: Default::default(),
                    redirect_dest: None,
                },
                PolicyRule {
                    uri: uri("/c1/r1/"),
                    direction: RuleDirection::Bidirectional,
                    action: RuleAction::Allow,
                    order: 1,
                    classifier: Default::default(),
                    redirect_dest: None,
                },
            ],
        });

        let expanded = r.expand_contract(&uri("/c1/"), &uri("/g1/"), &uri("/g2/")).unwrap();
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].priority > expanded[1].priority);
    }

    #[test]
    fn test_expand_contract_collapses_bidirectional_rule() {
        let mut r = PolicyResolver::new();
        let contract_uri = uri("/c2/");
        r.upsert_epg(EndpointGroup {
            uri: uri("/g1/"),
            bd: None,
            fd: None,
            rd: None,
            vnid: Some(Vnid::new(1).unwrap()),
            multicast_ip: None,
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![contract_uri.clone()],
            consumer_contracts: vec![contract_uri.clone()],
            intra_contracts: vec![],
            nat_epg: None,
        });
        r.upsert_epg(EndpointGroup {
            uri: uri("/g2/"),
            bd: None,
            fd: None,
            rd: None,
            vnid: Some(Vnid::new(2).unwrap()),
            multicast_ip: None,
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![contract_uri.clone()],
            consumer_contracts: vec![contract_uri.clone()],
            intra_contracts: vec![],
            nat_epg: None,
        });
        r.upsert_contract(Contract {
            uri: contract_uri.clone(),
            rules: vec![PolicyRule {
                uri: uri("/c2/r0/"),
                direction: RuleDirection::Bidirectional,
                action: RuleAction::Allow,
                order: 0,
                classifier: Default::default(),
                redirect_dest: None,
            }],
        });

        let expanded = r.expand_contract(&contract_uri, &uri("/g1/"), &uri("/g2/")).unwrap();
        assert_eq!(expanded.len(), 1, "bidirectional collapse produces only one direction's flows");
    }
}
