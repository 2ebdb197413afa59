//! Expands a contract's policy rules into POL-table flows between a
//! provider and consumer EPG vnid pair.
//!
//! A classifier's L4 port ranges are decomposed into value/mask matches
//! (`opflex_ovs::decompose_range`); TCP rules with `established` semantics
//! and reflexive-conntrack rules each expand into more than one flow per
//! classifier, matching the component design's rule-computation policies.

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::Cookie;

use crate::policy::resolver::ExpandedRule;
use crate::policy::types::{Classifier, ConntrackMode, RuleAction};

use super::tables::{Register, TableId};

/// conntrack zone equals the rd-id (design note): every ct action in this
/// module is parameterized by the rd id of the traffic's routing domain.
pub fn build_contract_flows(provider_vnid: u32, consumer_vnid: u32, rd_id: u32, rules: &[ExpandedRule]) -> Vec<FlowEntry> {
    let mut flows = Vec::new();
    for expanded in rules {
        flows.extend(build_rule_flows(provider_vnid, consumer_vnid, rd_id, expanded));
    }
    flows
}

fn build_rule_flows(provider_vnid: u32, consumer_vnid: u32, rd_id: u32, expanded: &ExpandedRule) -> Vec<FlowEntry> {
    let rule = &expanded.rule;
    let cookie = Cookie::classifier(rule.order);
    let base = || {
        FlowBuilder::new(TableId::Pol)
            .priority(expanded.priority)
            .cookie(cookie)
            .reg(Register::Reg0, consumer_vnid)
            .reg(Register::Reg2, provider_vnid)
    };

    let terminal = match rule.action {
        RuleAction::Allow => TableId::Stats,
        RuleAction::Deny => TableId::ExpDrop,
    };

    if rule.classifier.conntrack == ConntrackMode::Reflexive && rule.action == RuleAction::Allow {
        return build_reflexive_flows(provider_vnid, consumer_vnid, rd_id, &rule.classifier, cookie, expanded.priority);
    }

    apply_classifier(base(), &rule.classifier)
        .into_iter()
        .map(|b| b.go_to(terminal).build())
        .collect()
}

/// Expands a reflexive rule into the four-class forward/reverse pair the
/// component design calls for: FWD_TRACK (send-to-conntrack), FWD_EST
/// (already-established forward traffic allowed), REV_TRACK, and
/// REV_ALLOW — forward and reverse are installed together or not at all.
fn build_reflexive_flows(provider_vnid: u32, consumer_vnid: u32, rd_id: u32, classifier: &Classifier, cookie: Cookie, priority: u16) -> Vec<FlowEntry> {
    let mut flows = Vec::new();

    // FWD_TRACK: new traffic from consumer to provider enters conntrack.
    let fwd_track = apply_classifier(
        FlowBuilder::new(TableId::Pol)
            .priority(priority)
            .cookie(cookie)
            .reg(Register::Reg0, consumer_vnid)
            .reg(Register::Reg2, provider_vnid)
            .conntrack_state(0, 0x20), // -trk
        classifier,
    );
    for b in fwd_track {
        flows.push(b.action(Action::ConntrackRecirc { zone: rd_id as u16 }).build());
    }

    // FWD_EST: already-tracked, established traffic is allowed straight
    // through.
    let fwd_est = apply_classifier(
        FlowBuilder::new(TableId::Pol)
            .priority(priority)
            .cookie(cookie)
            .reg(Register::Reg0, consumer_vnid)
            .reg(Register::Reg2, provider_vnid)
            .conntrack_state(0x22, 0x22), // +trk+est
        classifier,
    );
    for b in fwd_est {
        flows.push(b.go_to(TableId::Stats).build());
    }

    // REV_TRACK / REV_ALLOW: the reverse direction, provider to consumer,
    // is only ever allowed once conntrack confirms it belongs to a
    // connection opened in the forward direction above.
    let rev_track = apply_classifier(
        FlowBuilder::new(TableId::Pol)
            .priority(priority)
            .cookie(cookie)
            .reg(Register::Reg0, provider_vnid)
            .reg(Register::Reg2, consumer_vnid)
            .conntrack_state(0, 0x20),
        classifier,
    );
    for b in rev_track {
        flows.push(b.action(Action::ConntrackRecirc { zone: rd_id as u16 }).build());
    }

    let rev_allow = apply_classifier(
        FlowBuilder::new(TableId::Pol)
            .priority(priority)
            .cookie(cookie)
            .reg(Register::Reg0, provider_vnid)
            .reg(Register::Reg2, consumer_vnid)
            .conntrack_state(0x22, 0x22),
        classifier,
    );
    for b in rev_allow {
        flows.push(b.go_to(TableId::Stats).build());
    }

    flows
}

/// Applies a classifier's match predicates to a flow builder, expanding any
/// port range into one builder per `(value, mask)` decomposition so the
/// caller ends up with one flow per mask instead of one flow per port.
fn apply_classifier(base: FlowBuilder, classifier: &Classifier) -> Vec<FlowBuilder> {
    let mut builders = vec![base];

    if let Some(eth_type) = classifier.ethertype {
        builders = builders.into_iter().map(|b| b.eth_type(eth_type)).collect();
    }
    if let Some(proto) = classifier.ip_proto {
        builders = builders.into_iter().map(|b| b.proto(proto)).collect();
    }
    if let Some((icmp_type, icmp_code)) = classifier.icmp_type.zip(classifier.icmp_code) {
        builders = builders
            .into_iter()
            .map(|b| b.tp_src(icmp_type as u16, 0xffff).tp_dst(icmp_code as u16, 0xffff))
            .collect();
    }
    if let Some((flags, mask)) = classifier.tcp_flags {
        builders = builders.into_iter().map(|b| b.tcp_flags(flags, mask)).collect();
    }
    if let Some((min, max)) = classifier.l4_src_ports {
        builders = expand_port_range(builders, min, max, true);
    }
    if let Some((min, max)) = classifier.l4_dst_ports {
        builders = expand_port_range(builders, min, max, false);
    }

    builders
}

fn expand_port_range(builders: Vec<FlowBuilder>, min: u16, max: u16, is_src: bool) -> Vec<FlowBuilder> {
    let masks = opflex_ovs::decompose_range(min, max);
    let mut out = Vec::with_capacity(builders.len() * masks.len());
    for b in builders {
        for m in &masks {
            let b2 = b.clone();
            out.push(if is_src { b2.tp_src(m.value, m.mask) } else { b2.tp_dst(m.value, m.mask) });
        }
    }
    out
}
