//! Managed-object-database URI, the stable identity of every policy object.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An absolute path identifying an object in the managed object database,
/// e.g. `/PolicyUniverse/PolicySpace/tenant0/GbpEpGroup/g1/`.
///
/// A `Uri` is always stored with a leading and trailing `/`; this keeps
/// [`Uri::child`] and [`Uri::parent`] simple string operations instead of
/// needing special-cased joins. Two `Uri`s are equal iff their normalized
/// strings are equal, so `Uri` is a safe key for the id generator and
/// task-queue maps (§4.1, §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    /// The root URI, `/`.
    pub fn root() -> Self {
        Uri("/".to_string())
    }

    /// Builds a URI from path components, e.g.
    /// `Uri::from_components(["PolicyUniverse", "PolicySpace", "tenant0"])`.
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut s = String::from("/");
        for c in components {
            s.push_str(c.as_ref());
            s.push('/');
        }
        Uri(s)
    }

    /// Returns the path components, with empty segments (from the leading
    /// and trailing slashes) removed.
    pub fn components(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Returns a new `Uri` with one more component appended.
    pub fn child(&self, component: impl AsRef<str>) -> Self {
        let mut s = self.0.clone();
        s.push_str(component.as_ref());
        s.push('/');
        Uri(s)
    }

    /// Returns the parent URI, or `None` if this is already the root.
    pub fn parent(&self) -> Option<Uri> {
        let components = self.components();
        if components.is_empty() {
            return None;
        }
        Some(Uri::from_components(&components[..components.len() - 1]))
    }

    /// Returns true if this is the root URI.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the underlying normalized string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uri {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::InvalidUri(s.to_string()));
        }
        let components: Vec<&str> = s.split('/').filter(|c| !c.is_empty()).collect();
        Ok(Uri::from_components(components))
    }
}

impl TryFrom<String> for Uri {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> String {
        uri.0
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root() {
        assert!(Uri::root().is_root());
        assert_eq!(Uri::root().to_string(), "/");
    }

    #[test]
    fn test_parse_normalizes_slashes() {
        let uri: Uri = "/PolicyUniverse/PolicySpace/tenant0".parse().unwrap();
        assert_eq!(uri.to_string(), "/PolicyUniverse/PolicySpace/tenant0/");
    }

    #[test]
    fn test_components() {
        let uri: Uri = "/PolicyUniverse/GbpEpGroup/g1/".parse().unwrap();
        assert_eq!(uri.components(), vec!["PolicyUniverse", "GbpEpGroup", "g1"]);
    }

    #[test]
    fn test_child_and_parent() {
        let root = Uri::root();
        let child = root.child("PolicyUniverse").child("GbpEpGroup").child("g1");
        assert_eq!(child.to_string(), "/PolicyUniverse/GbpEpGroup/g1/");

        let parent = child.parent().unwrap();
        assert_eq!(parent.to_string(), "/PolicyUniverse/GbpEpGroup/");
    }

    #[test]
    fn test_root_has_no_parent() {
        assert!(Uri::root().parent().is_none());
    }

    #[test]
    fn test_equality_ignores_surface_slashes() {
        let a: Uri = "/a/b".parse().unwrap();
        let b: Uri = "/a/b/".parse().unwrap();
        assert_eq!(a, b);
    }
}
