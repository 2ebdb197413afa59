//! Port Mapper (C2): bidirectional interface-name <-> OpenFlow port map,
//! with callback fan-out on port-status changes.
//!
//! Grounded on the teacher's `ports::PortsOrch` callback pattern
//! (`Arc<dyn Fn(...) + Send + Sync>` listener list), generalized from
//! port-lifecycle events (created/deleted/lag/vlan) down to the one event
//! this agent's pipeline cares about: an interface's name/ofport binding
//! appearing, changing, or disappearing.

use std::collections::HashMap;
use std::sync::Arc;

use opflex_types::OfPort;

/// A port-status change delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatusEvent {
    pub name: String,
    pub port: OfPort,
    /// True if this event came from an OVSDB port description rather than
    /// from the agent's own mapping request (mirrors `fromDesc` in the
    /// original port-status callback signature).
    pub from_desc: bool,
    pub present: bool,
}

pub type PortListener = Arc<dyn Fn(&PortStatusEvent) + Send + Sync>;

/// Bidirectional name<->ofport map.
#[derive(Default)]
pub struct PortMapper {
    by_name: HashMap<String, OfPort>,
    by_port: HashMap<OfPort, String>,
    listeners: Vec<PortListener>,
}

impl PortMapper {
    pub fn new() -> Self {
        PortMapper::default()
    }

    pub fn register_listener(&mut self, listener: PortListener) {
        self.listeners.push(listener);
    }

    /// Looks up the OpenFlow port number for an interface name.
    pub fn find_port(&self, name: &str) -> Option<OfPort> {
        self.by_name.get(name).copied()
    }

    /// Looks up the interface name bound to an OpenFlow port number.
    pub fn find_name(&self, port: OfPort) -> Option<&str> {
        self.by_port.get(&port).map(|s| s.as_str())
    }

    /// Binds `name` to `port`, notifying listeners. If `name` was
    /// previously bound to a different port, the old binding is replaced.
    pub fn update(&mut self, name: impl Into<String>, port: OfPort, from_desc: bool) {
        let name = name.into();
        if let Some(old_port) = self.by_name.get(&name).copied() {
            if old_port != port {
                self.by_port.remove(&old_port);
            }
        }
        self.by_name.insert(name.clone(), port);
        self.by_port.insert(port, name.clone());

        let event = PortStatusEvent {
            name,
            port,
            from_desc,
            present: true,
        };
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Removes the binding for `name`, notifying listeners.
    pub fn remove(&mut self, name: &str) {
        if let Some(port) = self.by_name.remove(name) {
            self.by_port.remove(&port);
            let event = PortStatusEvent {
                name: name.to_string(),
                port,
                from_desc: true,
                present: false,
            };
            for listener in &self.listeners {
                listener(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn test_find_port_and_name_roundtrip() {
        let mut mapper = PortMapper::new();
        mapper.update("veth1", OfPort::new(7), true);
        assert_eq!(mapper.find_port("veth1"), Some(OfPort::new(7)));
        assert_eq!(mapper.find_name(OfPort::new(7)), Some("veth1"));
    }

    #[test]
    fn test_find_missing_returns_none() {
        let mapper = PortMapper::new();
        assert_eq!(mapper.find_port("nope"), None);
    }

    #[test]
    fn test_update_rebinds_old_port_cleared() {
        let mut mapper = PortMapper::new();
        mapper.update("veth1", OfPort::new(7), true);
        mapper.update("veth1", OfPort::new(8), true);
        assert_eq!(mapper.find_port("veth1"), Some(OfPort::new(8)));
        assert_eq!(mapper.find_name(OfPort::new(7)), None);
    }

    #[test]
    fn test_remove_clears_both_directions() {
        let mut mapper = PortMapper::new();
        mapper.update("veth1", OfPort::new(7), true);
        mapper.remove("veth1");
        assert_eq!(mapper.find_port("veth1"), None);
        assert_eq!(mapper.find_name(OfPort::new(7)), None);
    }

    #[test]
    fn test_listener_fanout_receives_events() {
        let mut mapper = PortMapper::new();
        let seen: Arc<Mutex<Vec<PortStatusEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        mapper.register_listener(Arc::new(move |ev| seen2.lock().unwrap().push(ev.clone())));

        mapper.update("veth1", OfPort::new(7), false);
        mapper.remove("veth1");

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].present);
        assert!(!events[1].present);
    }
}
