//! Multicast group membership file: the set of active multicast IPs (EPG
//! and flood-context addresses) is kept in memory and diffed against the
//! last write; the actual write goes through a small sink trait so tests
//! can substitute an in-memory target instead of touching the filesystem.

use std::collections::BTreeSet;

use opflex_types::IpAddress;

/// Where the multicast group set gets written once it changes.
pub trait MulticastGroupSink {
    fn write(&mut self, groups: &BTreeSet<IpAddress>) -> std::io::Result<()>;
}

/// Writes one address per line to a file, overwriting it each time —
/// mirrors the teacher's flat-file publication style for out-of-process
/// consumers.
pub struct FileSink {
    path: std::path::PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        FileSink { path: path.into() }
    }
}

impl MulticastGroupSink for FileSink {
    fn write(&mut self, groups: &BTreeSet<IpAddress>) -> std::io::Result<()> {
        let body = groups.iter().map(|ip| ip.to_string()).collect::<Vec<_>>().join("\n");
        std::fs::write(&self.path, body)
    }
}

/// Tracks the active multicast group set and only invokes the sink when it
/// actually changed since the last write.
pub struct MulticastGroupManager<S: MulticastGroupSink> {
    sink: S,
    current: BTreeSet<IpAddress>,
}

impl<S: MulticastGroupSink> MulticastGroupManager<S> {
    pub fn new(sink: S) -> Self {
        MulticastGroupManager { sink, current: BTreeSet::new() }
    }

    /// Replaces the desired group set, writing through the sink only if it
    /// differs from what's currently tracked. Returns whether a write
    /// happened.
    pub fn set_groups(&mut self, groups: BTreeSet<IpAddress>) -> std::io::Result<bool> {
        if groups == self.current {
            return Ok(false);
        }
        self.sink.write(&groups)?;
        self.current = groups;
        Ok(true)
    }

    pub fn current(&self) -> &BTreeSet<IpAddress> {
        &self.current
    }
}
