//! Control interface configuration listener
//!
//! Re-reads the `control_interface` option when the operator asks for a
//! reload. An update that fails to decode or validate is dropped and the
//! engine keeps tracking the previous control interface.

use crate::config_db::ConfigStore;
use crate::config_file::P2pSyncConfig;
use crate::error::Result;
use crate::group_matcher::ControlInterface;
use crate::link_sync::GroupLinkSync;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of `control_interface` updates
#[derive(Debug, Clone)]
pub struct ControlConfigListener {
    path: PathBuf,
    pinned: Option<ControlInterface>,
}

impl ControlConfigListener {
    /// Listen for updates of the configuration file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pinned: None,
        }
    }

    /// Keep `control` regardless of the file contents
    ///
    /// Used when the control interface was given on the command line.
    pub fn pinned(mut self, control: ControlInterface) -> Self {
        self.pinned = Some(control);
        self
    }

    /// Configuration file watched by this listener
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode and validate the control interface from TOML text
    pub fn decode(content: &str) -> Result<ControlInterface> {
        P2pSyncConfig::from_toml(content)?.control_interface()
    }

    /// Read the control interface from the configuration file
    ///
    /// A missing file is an error here: the default only applies at startup.
    pub fn reload(&self) -> Result<ControlInterface> {
        if let Some(control) = &self.pinned {
            return Ok(control.clone());
        }
        let content = fs::read_to_string(&self.path)?;
        Self::decode(&content)
    }

    /// Reload and publish the control interface to `sync`
    ///
    /// Returns true if the tracked control interface changed.
    pub fn apply<S: ConfigStore>(&self, sync: &mut GroupLinkSync<S>) -> bool {
        match self.reload() {
            Ok(control) => {
                debug!(control_interface = %control, "Decoded p2p_route config");
                sync.set_control_interface(control)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    current = %sync.control_interface(),
                    "Could not convert p2p_route config, keeping previous control interface"
                );
                false
            }
        }
    }
}
