//! Static flows (installed once, and re-installed on every reconnect
//! through the switch manager's normal reconcile path since they are just
//! more entries in C6's desired state).

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::{Cookie, CookieClass, OfPort};

use super::tables::{TableId, DEFAULT_PRIORITY, STATIC_FLOW_PRIORITY, TABLE_DROP_PRIORITY};
use crate::config::Config;

/// ICMPv4 error types punted to the controller for NAT rewrite continuation.
const ICMP_DEST_UNREACHABLE: u8 = 3;
const ICMP_TIME_EXCEEDED: u8 = 11;
const ICMP_PARAM_PROBLEM: u8 = 12;

/// Builds the flows that are always present regardless of any resolved
/// MODB object: port-security defaults, DHCP/RS allow rules, tunnel/uplink
/// bypass, the terminal OUT default, and ICMP error punts.
pub fn build_static_flows(cfg: &Config, tunnel_port: Option<OfPort>, uplink_port: Option<OfPort>) -> Vec<FlowEntry> {
    let mut flows = Vec::new();

    // SEC: drop untagged L3 traffic by default (overridden per-endpoint).
    flows.push(
        FlowBuilder::new(TableId::Sec)
            .priority(TABLE_DROP_PRIORITY)
            .action(Action::Drop)
            .build(),
    );

    // SEC: allow DHCP client requests (UDP 68) and IPv6 router solicitation
    // (ICMPv6 type 133) through regardless of port security state.
    flows.push(
        FlowBuilder::new(TableId::Sec)
            .priority(STATIC_FLOW_PRIORITY)
            .proto(17)
            .tp_dst(68, 0xffff)
            .go_to(TableId::Src)
            .build(),
    );
    flows.push(
        FlowBuilder::new(TableId::Sec)
            .priority(STATIC_FLOW_PRIORITY)
            .proto(58)
            .tp_src(133, 0xffff)
            .go_to(TableId::Src)
            .build(),
    );

    // SEC: allow traffic from the tunnel/uplink ports unconditionally.
    if let Some(port) = tunnel_port {
        flows.push(
            FlowBuilder::new(TableId::Sec)
                .priority(DEFAULT_PRIORITY)
                .in_port(port)
                .go_to(TableId::Src)
                .build(),
        );
    }
    if let Some(port) = uplink_port {
        flows.push(
            FlowBuilder::new(TableId::Sec)
                .priority(DEFAULT_PRIORITY)
                .in_port(port)
                .go_to(TableId::Src)
                .build(),
        );
    }

    // POL: service-interface traffic bypasses contract enforcement.
    flows.push(
        FlowBuilder::new(TableId::Pol)
            .priority(DEFAULT_PRIORITY)
            .metadata(opflex_ovs::types::meta::FROM_SERVICE_INTERFACE, opflex_ovs::types::meta::FROM_SERVICE_INTERFACE)
            .go_to(TableId::Stats)
            .build(),
    );

    // OUT: REV_NAT default just continues to stats/output, no rewrite here
    // (the rewrite itself is installed per-endpoint in endpoint.rs).
    flows.push(
        FlowBuilder::new(TableId::Out)
            .priority(STATIC_FLOW_PRIORITY)
            .metadata_out(super::tables::MetaOut::RevNat)
            .action(Action::Resubmit(TableId::Out))
            .build(),
    );

    // OUT: REMOTE_TUNNEL outputs to the tunnel port.
    if let Some(port) = tunnel_port {
        flows.push(
            FlowBuilder::new(TableId::Out)
                .priority(STATIC_FLOW_PRIORITY)
                .metadata_out(super::tables::MetaOut::RemoteTunnel)
                .action(Action::Output(port))
                .build(),
        );
    }

    // OUT: terminal default — output to REG7 (the port chosen by an
    // earlier table). No explicit reg match: this is the catch-all.
    flows.push(
        FlowBuilder::new(TableId::Out)
            .priority(TABLE_DROP_PRIORITY)
            .action(Action::Output(OfPort::new(0)))
            .build(),
    );

    // EXP_DROP: terminal drop. Mirroring to a drop-log port (when
    // configured) is wired in once the port mapper resolves the name, at
    // apply time rather than here.
    flows.push(FlowBuilder::new(TableId::ExpDrop).priority(TABLE_DROP_PRIORITY).action(Action::Drop).build());

    // Reverse-NAT ICMP error punts (types 3, 11, 12) to the controller for
    // inner-packet rewrite continuation.
    for icmp_type in [ICMP_DEST_UNREACHABLE, ICMP_TIME_EXCEEDED, ICMP_PARAM_PROBLEM] {
        flows.push(
            FlowBuilder::new(TableId::NatIn)
                .priority(DEFAULT_PRIORITY)
                .proto(1)
                .tp_src(icmp_type as u16, 0xffff)
                .cookie(Cookie::reserved(CookieClass::IcmpErrorV4))
                .action(Action::Controller { max_len: 128 })
                .build(),
        );
    }

    // Service-stats table flows can be disabled via config.
    if !cfg.service_stats_flow_disabled {
        flows.push(
            FlowBuilder::new(TableId::Stats)
                .priority(TABLE_DROP_PRIORITY)
                .go_to(TableId::Out)
                .build(),
        );
    }

    // Table-default pass-through for every table whose explicit default is
    // simply "go to next table" (DROP_LOG, LEARN, SERVICE_DST have their own
    // defaults elsewhere, matching the spec's per-table role column).
    for table in TableId::ALL {
        if let Some(next) = table.default_next() {
            if matches!(table, TableId::Sec | TableId::Out | TableId::ExpDrop | TableId::Stats | TableId::Pol) {
                continue;
            }
            flows.push(FlowBuilder::new(table).priority(TABLE_DROP_PRIORITY).go_to(next).build());
        }
    }

    flows
}
