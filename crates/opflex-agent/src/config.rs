//! On-disk agent configuration: comment-stripped JSON, plus directory-watch
//! reload semantics.

use serde::Deserialize;
use std::path::Path;

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncapType {
    Vlan,
    Vxlan,
    Ivxlan,
    None,
}

impl Default for EncapType {
    fn default() -> Self {
        EncapType::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvertisementMode {
    Disabled,
    GratuitousArp,
    RouterAdvertisement,
}

impl Default for AdvertisementMode {
    fn default() -> Self {
        AdvertisementMode::Disabled
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvertisementConfig {
    #[serde(default)]
    pub mode: AdvertisementMode,
    /// Interval in seconds. Zero means "use the implementation default".
    #[serde(default)]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DropLogConfig {
    pub port: Option<String>,
    pub remote_ip: Option<String>,
    pub remote_port: Option<u16>,
}

/// Top-level agent configuration, mirroring the recognized keys table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub encap_type: EncapType,
    pub encap_iface: Option<String>,
    pub uplink_iface: Option<String>,
    pub tunnel_remote_ip: Option<String>,
    pub tunnel_remote_port: Option<u16>,
    pub virtual_router: bool,
    pub virtual_router_mac: Option<String>,
    pub router_adv: bool,
    pub virtual_dhcp_mac: Option<String>,
    pub endpoint_advertisements: AdvertisementConfig,
    pub tunnel_advertisements: AdvertisementConfig,
    pub multicast_group_file: Option<String>,
    pub drop_log: Option<DropLogConfig>,
    pub service_stats_flow_disabled: bool,
}

impl Config {
    /// Strips `#` and `//` line comments (outside of string literals) and
    /// parses the remainder as JSON.
    pub fn parse(raw: &str) -> Result<Config, AgentError> {
        let stripped = strip_json_comments(raw);
        serde_json::from_str(&stripped).map_err(|e| AgentError::ConfigParse { reason: e.to_string() })
    }

    /// Loads and validates a configuration file from disk.
    pub fn load(path: &Path) -> Result<Config, AgentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigParse {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let cfg = Config::parse(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Cross-checks option combinations that JSON schema alone can't express.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.encap_type == EncapType::Vlan && self.tunnel_remote_ip.is_some() {
            return Err(AgentError::BadConfigOption {
                key: "tunnel-remote-ip".into(),
                reason: "encap-type=vlan does not use a tunnel destination".into(),
            });
        }
        if matches!(self.encap_type, EncapType::Vxlan | EncapType::Ivxlan) && self.encap_iface.is_none() {
            return Err(AgentError::BadConfigOption {
                key: "encap-iface".into(),
                reason: "vxlan/ivxlan encap requires encap-iface".into(),
            });
        }
        if self.router_adv && !self.virtual_router {
            return Err(AgentError::BadConfigOption {
                key: "router-adv".into(),
                reason: "router-adv requires virtual-router".into(),
            });
        }
        Ok(())
    }
}

/// Strips `#` and `//` line comments that appear outside of string literals.
fn strip_json_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escape = false;
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '#' => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// What a directory-watch observation should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSignal {
    /// A `reboot*.conf` file changed: restart the whole process.
    Restart,
    /// Any other `*.conf` file changed: reload configuration in place.
    Reload,
}

/// Source of raw filesystem change events, abstracted so tests can inject
/// synthetic events instead of touching a real filesystem.
pub trait FsEventSource: Send {
    /// Returns the names of `.conf` files that changed since the last poll.
    fn poll_changed(&mut self) -> Vec<String>;
}

/// Polls an [`FsEventSource`] and classifies changes into [`ReloadSignal`]s.
pub struct ConfigWatcher<S: FsEventSource> {
    source: S,
}

impl<S: FsEventSource> ConfigWatcher<S> {
    pub fn new(source: S) -> Self {
        ConfigWatcher { source }
    }

    /// Polls for changes and returns the strongest signal observed (a
    /// `reboot*.conf` change always wins over a plain reload).
    pub fn poll(&mut self) -> Option<ReloadSignal> {
        let changed = self.source.poll_changed();
        if changed.is_empty() {
            return None;
        }
        if changed.iter().any(|name| name.starts_with("reboot") && name.ends_with(".conf")) {
            Some(ReloadSignal::Restart)
        } else if changed.iter().any(|name| name.ends_with(".conf")) {
            Some(ReloadSignal::Reload)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_hash_and_slash_comments() {
        let raw = r#"{
            "encap-type": "vxlan", // tunnel mode
            # a full line comment
            "encap-iface": "vxlan0"
        }"#;
        let stripped = strip_json_comments(raw);
        let cfg: Config = serde_json::from_str(&stripped).unwrap();
        assert_eq!(cfg.encap_type, EncapType::Vxlan);
        assert_eq!(cfg.encap_iface.as_deref(), Some("vxlan0"));
    }

    #[test]
    fn test_comment_markers_inside_strings_are_preserved() {
        let raw = r#"{"uplink-iface": "eth0 # not a comment // still not"}"#;
        let stripped = strip_json_comments(raw);
        let cfg: Config = serde_json::from_str(&stripped).unwrap();
        assert_eq!(cfg.uplink_iface.as_deref(), Some("eth0 # not a comment // still not"));
    }

    #[test]
    fn test_validate_rejects_vlan_with_tunnel_remote() {
        let cfg = Config {
            encap_type: EncapType::Vlan,
            tunnel_remote_ip: Some("10.0.0.1".into()),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_vxlan_without_iface() {
        let cfg = Config {
            encap_type: EncapType::Vxlan,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_default() {
        assert!(Config::default().validate().is_ok());
    }

    struct FakeFs {
        batches: Vec<Vec<String>>,
    }

    impl FsEventSource for FakeFs {
        fn poll_changed(&mut self) -> Vec<String> {
            self.batches.pop().unwrap_or_default()
        }
    }

    #[test]
    fn test_watcher_classifies_reboot_as_restart() {
        let mut watcher = ConfigWatcher::new(FakeFs {
            batches: vec![vec!["reboot-now.conf".to_string()]],
        });
        assert_eq!(watcher.poll(), Some(ReloadSignal::Restart));
    }

    #[test]
    fn test_watcher_classifies_other_conf_as_reload() {
        let mut watcher = ConfigWatcher::new(FakeFs {
            batches: vec![vec!["opflex-agent.conf".to_string()]],
        });
        assert_eq!(watcher.poll(), Some(ReloadSignal::Reload));
    }

    #[test]
    fn test_watcher_ignores_non_conf_files() {
        let mut watcher = ConfigWatcher::new(FakeFs {
            batches: vec![vec!["readme.txt".to_string()]],
        });
        assert_eq!(watcher.poll(), None);
    }
}
