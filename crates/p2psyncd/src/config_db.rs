//! Routing configuration store boundary
//!
//! The store holds named configuration sections such as
//! `interface[p2p-wlan0-1]`. Writes are staged and only take effect on
//! [`ConfigStore::commit`]. The presence of an `interface` section is the
//! only record of whether an interface is admitted.

use crate::error::{P2pSyncError, Result};
use crate::tables::INTERFACE_SECTION;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Parsed `<type>[<name>].<entry>` section path
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SectionPath {
    /// Section type, e.g. `interface`
    pub section_type: String,
    /// Section name, e.g. `p2p-wlan0-1`
    pub name: String,
    /// Optional `key=value` part after the dot
    pub entry: Option<String>,
}

impl SectionPath {
    /// Path of the `interface` section for `name`
    pub fn interface(name: &str) -> Self {
        Self {
            section_type: INTERFACE_SECTION.to_string(),
            name: name.to_string(),
            entry: None,
        }
    }

    /// Parse a section path
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| P2pSyncError::InvalidSectionPath(format!("{path}: {reason}"));

        let (section_type, rest) = path
            .split_once('[')
            .ok_or_else(|| invalid("missing '['"))?;
        let (name, rest) = rest.split_once(']').ok_or_else(|| invalid("missing ']'"))?;
        let entry = rest.strip_prefix('.').ok_or_else(|| invalid("missing '.'"))?;

        if section_type.is_empty()
            || !section_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("bad section type"));
        }
        if name.is_empty() || name.contains(['[', ']']) {
            return Err(invalid("bad section name"));
        }

        Ok(Self {
            section_type: section_type.to_string(),
            name: name.to_string(),
            entry: (!entry.is_empty()).then(|| entry.to_string()),
        })
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}].{}",
            self.section_type,
            self.name,
            self.entry.as_deref().unwrap_or("")
        )
    }
}

/// Transactional configuration database
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send {
    /// Check whether a committed named section exists
    async fn section_exists(&mut self, section_type: &str, name: &str) -> Result<bool>;

    /// Stage creation of the section addressed by `path`
    async fn set_entry(&mut self, path: &str) -> Result<()>;

    /// Stage removal of the section addressed by `path`
    ///
    /// Removing a section that does not exist is not an error.
    async fn remove_entry(&mut self, path: &str) -> Result<()>;

    /// Apply staged changes
    async fn commit(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PendingOp {
    Set(SectionPath),
    Remove(SectionPath),
}

/// In-process configuration store
///
/// Used in dry-run mode and as the store under test.
#[derive(Clone, Debug, Default)]
pub struct MemoryConfigStore {
    sections: BTreeSet<(String, String)>,
    pending: Vec<PendingOp>,
    commits: usize,
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with `interface` sections already committed
    pub fn with_interfaces<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let sections = names
            .into_iter()
            .map(|n| (INTERFACE_SECTION.to_string(), n.to_string()))
            .collect();
        Self {
            sections,
            ..Self::default()
        }
    }

    /// Names of committed sections of `section_type`
    pub fn section_names(&self, section_type: &str) -> Vec<String> {
        self.sections
            .iter()
            .filter(|(t, _)| t == section_type)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Whether an `interface` section for `name` is committed
    pub fn has_interface(&self, name: &str) -> bool {
        self.sections
            .contains(&(INTERFACE_SECTION.to_string(), name.to_string()))
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Number of staged, uncommitted operations
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn section_exists(&mut self, section_type: &str, name: &str) -> Result<bool> {
        Ok(self
            .sections
            .contains(&(section_type.to_string(), name.to_string())))
    }

    async fn set_entry(&mut self, path: &str) -> Result<()> {
        let path = SectionPath::parse(path)?;
        debug!(path = %path, "Staging section set");
        self.pending.push(PendingOp::Set(path));
        Ok(())
    }

    async fn remove_entry(&mut self, path: &str) -> Result<()> {
        let path = SectionPath::parse(path)?;
        debug!(path = %path, "Staging section removal");
        self.pending.push(PendingOp::Remove(path));
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        for op in std::mem::take(&mut self.pending) {
            match op {
                PendingOp::Set(p) => {
                    self.sections.insert((p.section_type, p.name));
                }
                PendingOp::Remove(p) => {
                    self.sections.remove(&(p.section_type, p.name));
                }
            }
        }
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interface_path() {
        let path = SectionPath::parse("interface[p2p-wlan0-1].").unwrap();
        assert_eq!(path, SectionPath::interface("p2p-wlan0-1"));
        assert_eq!(path.to_string(), "interface[p2p-wlan0-1].");
    }

    #[test]
    fn test_parse_path_with_entry() {
        let path = SectionPath::parse("interface[wlan0].rx_bitrate=1M").unwrap();
        assert_eq!(path.entry.as_deref(), Some("rx_bitrate=1M"));
        assert_eq!(path.to_string(), "interface[wlan0].rx_bitrate=1M");
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in [
            "interface",
            "interface[wlan0]",
            "interface[].",
            "[wlan0].",
            "inter face[wlan0].",
            "interface[wl[an0].",
        ] {
            assert!(SectionPath::parse(bad).is_err(), "{bad} accepted");
        }
    }

    #[tokio::test]
    async fn test_set_is_invisible_until_commit() {
        let mut store = MemoryConfigStore::new();
        store.set_entry("interface[p2p-wlan0-1].").await.unwrap();
        assert!(!store.section_exists("interface", "p2p-wlan0-1").await.unwrap());
        assert_eq!(store.pending_count(), 1);

        store.commit().await.unwrap();
        assert!(store.section_exists("interface", "p2p-wlan0-1").await.unwrap());
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_section_is_noop() {
        let mut store = MemoryConfigStore::with_interfaces(["wlan0"]);
        store.remove_entry("interface[p2p-wlan0-1].").await.unwrap();
        assert_eq!(store.pending_count(), 1);
        store.commit().await.unwrap();
        assert_eq!(store.section_names("interface"), vec!["wlan0".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_committed_section() {
        let mut store = MemoryConfigStore::with_interfaces(["p2p-wlan0-1", "wlan0"]);
        store.remove_entry("interface[p2p-wlan0-1].").await.unwrap();
        store.commit().await.unwrap();
        assert_eq!(store.section_names("interface"), vec!["wlan0".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_path_is_not_staged() {
        let mut store = MemoryConfigStore::new();
        assert!(store.set_entry("interface[p2p-wlan0-1]").await.is_err());
        assert_eq!(store.pending_count(), 0);
    }
}
