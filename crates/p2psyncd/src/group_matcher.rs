//! Peer-group interface name classification
//!
//! Peer-group interfaces spawned by the wireless P2P stack are named
//! `p2p-<control>-<index>`, e.g. `p2p-wlan0-3`. The matcher works on the
//! structured name components instead of a regular expression, so an
//! operator-supplied control name is always treated as a literal.

use crate::error::{P2pSyncError, Result};
use crate::tables::{ANY_CONTROL_INTERFACE, GROUP_PREFIX, MAX_IFNAME_LEN};
use std::fmt;

/// Validated `control_interface` option value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlInterface {
    /// Track peer groups of every control interface (`"all"`)
    Any,
    /// Track only peer groups spawned from this interface
    Named(String),
}

impl ControlInterface {
    /// Parse and validate an operator-supplied control interface name
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: String| P2pSyncError::InvalidControlInterface {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if name == ANY_CONTROL_INTERFACE {
            return Ok(Self::Any);
        }
        if name.len() > MAX_IFNAME_LEN {
            return Err(invalid(format!(
                "name longer than {} characters",
                MAX_IFNAME_LEN
            )));
        }
        if let Some(c) = name.chars().find(|c| !is_device_char(*c)) {
            return Err(invalid(format!("invalid character {:?}", c)));
        }

        Ok(Self::Named(name.to_string()))
    }

    /// Name as it appears in configuration
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => ANY_CONTROL_INTERFACE,
            Self::Named(name) => name,
        }
    }

    /// Derive the group name pattern for this control interface
    pub fn pattern(&self) -> GroupNamePattern {
        match self {
            Self::Any => GroupNamePattern::AnyControl,
            Self::Named(name) => GroupNamePattern::Control(name.clone()),
        }
    }
}

impl Default for ControlInterface {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for ControlInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape `p2p-<control>-<digits>` a group interface name must have
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupNamePattern {
    /// Any non-empty control component
    AnyControl,
    /// Exactly this control component
    Control(String),
}

impl GroupNamePattern {
    /// Check whether `interface_name` is a peer-group interface of this pattern
    pub fn matches(&self, interface_name: &str) -> bool {
        let Some(rest) = interface_name.strip_prefix(GROUP_PREFIX) else {
            return false;
        };

        match self {
            Self::AnyControl => match rest.rsplit_once('-') {
                Some((control, index)) => {
                    !control.is_empty() && control.chars().all(is_device_char) && is_index(index)
                }
                None => false,
            },
            Self::Control(control) => rest
                .strip_prefix(control.as_str())
                .and_then(|r| r.strip_prefix('-'))
                .is_some_and(is_index),
        }
    }
}

/// Check `interface_name` against the pattern derived from `control_interface`
///
/// An invalid control interface name never matches anything.
pub fn matches(interface_name: &str, control_interface: &str) -> bool {
    ControlInterface::parse(control_interface)
        .map(|c| c.pattern().matches(interface_name))
        .unwrap_or(false)
}

fn is_device_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn is_index(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
