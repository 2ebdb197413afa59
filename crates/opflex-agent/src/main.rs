//! opflex-agent: policy-driven OpenFlow agent entry point.
//!
//! Wires the C1-C9 Orchs onto an [`OrchDaemon`] and drives it off the
//! configured heartbeat until a signal or config-watch event stops it.

use std::collections::HashMap;
use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, RwLock};

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::watch;

use opflex_agent::advert::{AdvertisementManager, EndpointSource};
use opflex_agent::audit::{init_logging, init_logging_pretty};
use opflex_agent::config::{Config, ConfigWatcher, FsEventSource, ReloadSignal};
use opflex_agent::daemon::{DaemonSignals, OrchDaemon, OrchDaemonConfig};
use opflex_agent::error::AgentError;
use opflex_agent::intflow::orch::IntegrationFlowManager;
use opflex_agent::packetin::{PacketInHandler, PolicyLookup};
use opflex_agent::policy::types::{Endpoint, Subnet};
use opflex_agent::portmap::PortMapper;
use opflex_agent::stats::TableDropStatsManager;
use opflex_ovs::conn::FakeConnection;
use opflex_types::{IpAddress, MacAddress};

/// OpFlex policy-driven OpenFlow agent.
#[derive(Parser, Debug)]
#[command(name = "opflex-agent", author, version, about)]
struct Args {
    /// Path to the agent configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Watch the configuration file's directory and reload/restart on change.
    #[arg(long)]
    watch: bool,

    /// Reserved for future file-based log output; logs go to stdout/stderr.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    level: String,

    /// Emit JSON-structured logs suitable for ingestion by a log collector,
    /// instead of human-readable pretty output.
    #[arg(long)]
    syslog: bool,

    /// Placeholder for running under a process supervisor; the agent
    /// itself never forks.
    #[arg(long)]
    daemon: bool,
}

/// Reads `.conf` file mtimes under a directory, reporting a name as changed
/// whenever its mtime differs from the last poll.
struct DirMtimeWatch {
    dir: PathBuf,
    last_seen: HashMap<String, std::time::SystemTime>,
}

impl DirMtimeWatch {
    fn new(dir: PathBuf) -> Self {
        DirMtimeWatch { dir, last_seen: HashMap::new() }
    }
}

impl FsEventSource for DirMtimeWatch {
    fn poll_changed(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("config watch: failed to read {}: {e}", self.dir.display());
                return changed;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".conf") {
                continue;
            }
            let Ok(metadata) = entry.metadata() else { continue };
            let Ok(modified) = metadata.modified() else { continue };
            if self.last_seen.get(&name) != Some(&modified) {
                self.last_seen.insert(name.clone(), modified);
                changed.push(name);
            }
        }
        changed
    }
}

/// In-memory endpoint store standing in for the live MODB resolver: holds
/// whatever endpoints have been learned, and answers the packet-in
/// handler's and advertisement manager's lookups against that set. A
/// production binary would back this with the full policy resolver.
struct EndpointStore {
    endpoints: RwLock<Vec<Endpoint>>,
    virtual_router_mac: Option<MacAddress>,
}

impl EndpointStore {
    fn new(virtual_router_mac: Option<MacAddress>) -> Self {
        EndpointStore { endpoints: RwLock::new(Vec::new()), virtual_router_mac }
    }
}

impl PolicyLookup for EndpointStore {
    fn resolve_target_mac(&self, target_ip: IpAddress) -> Option<MacAddress> {
        let endpoints = self.endpoints.read().unwrap();
        if let Some(ep) = endpoints.iter().find(|ep| ep.ips.contains(&target_ip)) {
            return ep.mac;
        }
        self.virtual_router_mac
    }

    fn endpoint_by_mac(&self, client_mac: MacAddress) -> Option<Endpoint> {
        self.endpoints.read().unwrap().iter().find(|ep| ep.mac == Some(client_mac)).cloned()
    }

    fn mapped_ip_for_floating(&self, floating_ip: IpAddress) -> Option<IpAddress> {
        let endpoints = self.endpoints.read().unwrap();
        endpoints
            .iter()
            .find_map(|ep| ep.ip_mappings.iter().find(|m| m.floating_ip == floating_ip).map(|m| m.mapped_ip))
    }

    fn endpoints_on_iface(&self, iface_name: &str) -> Vec<Endpoint> {
        self.endpoints.read().unwrap().iter().filter(|ep| ep.iface_name == iface_name).cloned().collect()
    }

    fn subnets_on_iface(&self, _iface_name: &str) -> Vec<Subnet> {
        Vec::new()
    }
}

impl EndpointSource for EndpointStore {
    fn local_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.read().unwrap().clone()
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    if args.syslog {
        init_logging(&args.level);
    } else {
        init_logging_pretty(&args.level);
    }

    match panic::catch_unwind(|| run(&args)) {
        Ok(code) => code,
        Err(_) => {
            error!("opflex-agent panicked during startup or execution");
            ExitCode::from(3)
        }
    }
}

fn load_config(path: &Path) -> Result<Config, AgentError> {
    Config::load(path)
}

fn run(args: &Args) -> ExitCode {
    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load config {}: {e}", path.display());
                return ExitCode::from(4);
            }
        },
        None => Config::default(),
    };

    if args.daemon {
        info!("running under supervisor; staying attached to this process");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return ExitCode::from(2);
        }
    };

    runtime.block_on(async_main(config, args))
}

async fn async_main(config: Config, args: &Args) -> ExitCode {
    let router_mac = match config.virtual_router_mac.as_deref().map(str::parse::<MacAddress>) {
        Some(Ok(mac)) => mac,
        Some(Err(_)) => {
            error!("invalid virtual-router-mac in config");
            return ExitCode::from(4);
        }
        None => MacAddress::new([0, 0, 0, 0, 0, 1]),
    };

    let conn = Arc::new(FakeConnection::new());
    conn.set_connected(true);

    let store = Arc::new(EndpointStore::new(Some(router_mac)));
    let ports = Arc::new(RwLock::new(PortMapper::new()));

    let mut daemon = OrchDaemon::new(OrchDaemonConfig::default());

    let intflow = IntegrationFlowManager::new(Arc::clone(&conn), config.clone(), router_mac);
    daemon.register_orch(Box::new(intflow));

    let policy_lookup: Arc<dyn PolicyLookup> = store.clone();
    let packetin = PacketInHandler::new(Arc::clone(&conn), Arc::clone(&ports), policy_lookup);
    daemon.register_orch(Box::new(packetin));

    let stats = TableDropStatsManager::new(Arc::clone(&conn));
    daemon.register_orch(Box::new(stats));

    let tunnel_ip = config.tunnel_remote_ip.as_deref().and_then(|s| s.parse().ok());
    let endpoint_source: Arc<dyn EndpointSource> = store;
    let advert = AdvertisementManager::new(
        Arc::clone(&conn),
        Arc::clone(&ports),
        endpoint_source,
        config.endpoint_advertisements.clone(),
        config.tunnel_advertisements.clone(),
        config.uplink_iface.clone(),
        router_mac,
        tunnel_ip,
    );
    daemon.register_orch(Box::new(advert));

    daemon.init().await;

    let (stop_tx, stop_rx) = watch::channel(false);
    let (reload_tx, reload_rx) = watch::channel(0u64);

    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("shutdown signal received");
        let _ = stop_tx.send(true);
    });

    if args.watch {
        if let Some(dir) = args.config.as_ref().and_then(|p| p.parent()).map(Path::to_path_buf) {
            tokio::spawn(watch_config(dir, reload_tx));
        }
    }

    daemon.run(DaemonSignals { stop_rx, reload_rx }).await;
    ExitCode::SUCCESS
}

async fn watch_config(dir: PathBuf, reload_tx: watch::Sender<u64>) {
    let mut watcher = ConfigWatcher::new(DirMtimeWatch::new(dir));
    let mut generation = 0u64;
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(2));
    loop {
        ticker.tick().await;
        match watcher.poll() {
            Some(ReloadSignal::Restart) => {
                warn!("reboot-class config file changed; a restart is required to pick it up");
                generation += 1;
                let _ = reload_tx.send(generation);
            }
            Some(ReloadSignal::Reload) => {
                info!("config file changed; signalling reload");
                generation += 1;
                let _ = reload_tx.send(generation);
            }
            None => {}
        }
    }
}
