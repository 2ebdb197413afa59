//! Advertisement Manager (C9): two independent periodic timers — one
//! re-announcing locally hosted endpoints' addresses, one re-announcing the
//! agent's own tunnel-endpoint IP — reusing the packet-in handler's ARP/NA
//! synthesis rather than duplicating header construction.
//!
//! Each timer counts heartbeat ticks rather than wall-clock time: the daemon
//! sweeps every registered [`Orch`]'s `on_timer()` once per heartbeat
//! (`~1s` by default), so a tick is treated as one second elapsed toward the
//! configured interval.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use opflex_core::Orch;
use opflex_ovs::SwitchConnection;
use opflex_types::{IpAddress, Ipv4Address, MacAddress};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::config::{AdvertisementConfig, AdvertisementMode};
use crate::packetin::{arp, ndp};
use crate::policy::types::Endpoint;
use crate::portmap::PortMapper;

const DEFAULT_ENDPOINT_INTERVAL_SECS: u64 = 30;
const DEFAULT_TUNNEL_INTERVAL_SECS: u64 = 60;

fn audit(category: AuditCategory, source: &str, action: impl Into<String>, outcome: AuditOutcome) {
    audit_log!(AuditRecord::new(category, source, action).with_outcome(outcome));
}

/// Supplies the set of locally hosted endpoints to re-announce; kept
/// narrow and mockable rather than handing the manager the whole resolver.
pub trait EndpointSource: Send + Sync {
    fn local_endpoints(&self) -> Vec<Endpoint>;
}

pub struct AdvertisementManager<C: SwitchConnection> {
    conn: Arc<C>,
    ports: Arc<RwLock<PortMapper>>,
    endpoints: Arc<dyn EndpointSource>,
    endpoint_cfg: AdvertisementConfig,
    tunnel_cfg: AdvertisementConfig,
    tunnel_iface: Option<String>,
    tunnel_mac: MacAddress,
    tunnel_ip: Option<Ipv4Address>,
    endpoint_elapsed_secs: u64,
    tunnel_elapsed_secs: u64,
    endpoint_due: bool,
    tunnel_due: bool,
}

impl<C: SwitchConnection> AdvertisementManager<C> {
    pub fn new(
        conn: Arc<C>,
        ports: Arc<RwLock<PortMapper>>,
        endpoints: Arc<dyn EndpointSource>,
        endpoint_cfg: AdvertisementConfig,
        tunnel_cfg: AdvertisementConfig,
        tunnel_iface: Option<String>,
        tunnel_mac: MacAddress,
        tunnel_ip: Option<Ipv4Address>,
    ) -> Self {
        AdvertisementManager {
            conn,
            ports,
            endpoints,
            endpoint_cfg,
            tunnel_cfg,
            tunnel_iface,
            tunnel_mac,
            tunnel_ip,
            endpoint_elapsed_secs: 0,
            tunnel_elapsed_secs: 0,
            endpoint_due: false,
            tunnel_due: false,
        }
    }

    fn endpoint_interval(&self) -> u64 {
        if self.endpoint_cfg.interval_secs > 0 { self.endpoint_cfg.interval_secs } else { DEFAULT_ENDPOINT_INTERVAL_SECS }
    }

    fn tunnel_interval(&self) -> u64 {
        if self.tunnel_cfg.interval_secs > 0 { self.tunnel_cfg.interval_secs } else { DEFAULT_TUNNEL_INTERVAL_SECS }
    }

    fn find_port(&self, iface: &str) -> Option<opflex_types::OfPort> {
        self.ports.read().unwrap().find_port(iface)
    }

    async fn advertise_endpoints(&self) {
        for ep in self.endpoints.local_endpoints() {
            let Some(mac) = ep.mac else { continue };
            let iface = ep.access_iface.as_deref().unwrap_or(ep.iface_name.as_str());
            let Some(port) = self.find_port(iface) else { continue };
            for ip in &ep.ips {
                let frame = match ip {
                    IpAddress::V4(v4) => arp::build_gratuitous_arp(mac, *v4),
                    IpAddress::V6(v6) => ndp::build_unsolicited_na(*v6, mac),
                };
                if let Err(e) = self.conn.packet_out(port.as_u32(), &frame).await {
                    audit(AuditCategory::ErrorCondition, "advert", format!("endpoint advertisement for {} failed: {e}", ep.uuid), AuditOutcome::Failure);
                }
            }
        }
    }

    async fn advertise_tunnel(&self) {
        let (Some(iface), Some(ip)) = (&self.tunnel_iface, self.tunnel_ip) else { return };
        let Some(port) = self.find_port(iface) else { return };
        let frame = arp::build_gratuitous_arp(self.tunnel_mac, ip);
        if let Err(e) = self.conn.packet_out(port.as_u32(), &frame).await {
            audit(AuditCategory::ErrorCondition, "advert", format!("tunnel advertisement failed: {e}"), AuditOutcome::Failure);
        }
    }
}

#[async_trait]
impl<C: SwitchConnection + 'static> Orch for AdvertisementManager<C> {
    fn name(&self) -> &str {
        "AdvertisementManager"
    }

    async fn do_task(&mut self) {
        if self.endpoint_due {
            self.endpoint_due = false;
            if self.endpoint_cfg.mode != AdvertisementMode::Disabled {
                self.advertise_endpoints().await;
            }
        }
        if self.tunnel_due {
            self.tunnel_due = false;
            if self.tunnel_cfg.mode != AdvertisementMode::Disabled {
                self.advertise_tunnel().await;
            }
        }
    }

    fn has_pending_tasks(&self) -> bool {
        self.endpoint_due || self.tunnel_due
    }

    fn on_timer(&mut self) {
        if self.endpoint_cfg.mode != AdvertisementMode::Disabled {
            self.endpoint_elapsed_secs += 1;
            if self.endpoint_elapsed_secs >= self.endpoint_interval() {
                self.endpoint_elapsed_secs = 0;
                self.endpoint_due = true;
            }
        }
        if self.tunnel_cfg.mode != AdvertisementMode::Disabled {
            self.tunnel_elapsed_secs += 1;
            if self.tunnel_elapsed_secs >= self.tunnel_interval() {
                self.tunnel_elapsed_secs = 0;
                self.tunnel_due = true;
            }
        }
    }

    fn priority(&self) -> i32 {
        40
    }
}
