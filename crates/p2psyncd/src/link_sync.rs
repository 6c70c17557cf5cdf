//! Peer-group interface reconciliation
//!
//! For every link event whose name matches the current group pattern the
//! desired membership (interface up) is compared with the actual one (an
//! `interface` section exists in the store). A mismatch is fixed with a
//! single set/remove followed by a commit. Nothing is cached between
//! events: the store is asked again every time.

use crate::config_db::{ConfigStore, SectionPath};
use crate::error::Result;
use crate::group_matcher::{ControlInterface, GroupNamePattern};
use crate::link_event::{LinkEvent, LinkNotice};
use crate::metrics::MetricsCollector;
use crate::tables::INTERFACE_SECTION;
use tracing::{debug, info, instrument, warn};

/// Outcome of reconciling one link event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// Interface is not a tracked peer-group interface
    Ignored,
    /// Store already reflects the link state
    Unchanged,
    /// Interface section added and committed
    Admitted,
    /// Interface section removed and committed
    Withdrawn,
}

/// Reconciliation engine between link state and the routing configuration
pub struct GroupLinkSync<S: ConfigStore> {
    store: S,
    control: ControlInterface,
    pattern: GroupNamePattern,
    metrics: MetricsCollector,
}

impl<S: ConfigStore> GroupLinkSync<S> {
    /// Create an engine tracking the peer groups of `control`
    pub fn new(store: S, control: ControlInterface, metrics: MetricsCollector) -> Self {
        let pattern = control.pattern();
        Self {
            store,
            control,
            pattern,
            metrics,
        }
    }

    /// Control interface currently tracked
    pub fn control_interface(&self) -> &ControlInterface {
        &self.control
    }

    /// Replace the tracked control interface
    ///
    /// Returns true if the value changed.
    pub fn set_control_interface(&mut self, control: ControlInterface) -> bool {
        if control == self.control {
            return false;
        }
        info!(old = %self.control, new = %control, "Control interface updated");
        self.pattern = control.pattern();
        self.control = control;
        true
    }

    /// Whether `name` belongs to the tracked peer group
    pub fn is_group_interface(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }

    /// Access the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Metrics collector shared with this engine
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Handle any notice from the link event source
    ///
    /// Failures are logged here and left for a later event to repair.
    pub async fn handle_notice(&mut self, notice: &LinkNotice) -> Option<SyncAction> {
        match notice {
            LinkNotice::Link(event) => self.handle_event(event).await.ok(),
            LinkNotice::DumpDone { seq } => {
                debug!(seq, "Link dump done");
                None
            }
            LinkNotice::Error { seq, code } => {
                warn!(seq, code, "Netlink error reply");
                self.metrics.record_netlink_error();
                None
            }
        }
    }

    /// Reconcile store membership with one link event
    #[instrument(skip(self, event), fields(interface = %event.name, ifindex = event.ifindex))]
    pub async fn handle_event(&mut self, event: &LinkEvent) -> Result<SyncAction> {
        if !self.pattern.matches(&event.name) {
            debug!("Not a p2p group interface");
            return Ok(SyncAction::Ignored);
        }

        self.metrics.record_event();
        debug!(
            up = event.is_up,
            new_link = event.is_new_link(),
            "P2P group interface event"
        );

        let admitted = self.is_admitted(&event.name).await?;

        match (event.wants_admission(), admitted) {
            (true, false) => {
                self.admit(&event.name).await?;
                Ok(SyncAction::Admitted)
            }
            (false, true) => {
                self.withdraw(&event.name).await?;
                Ok(SyncAction::Withdrawn)
            }
            _ => {
                debug!(admitted, "Configuration already up to date");
                Ok(SyncAction::Unchanged)
            }
        }
    }

    async fn is_admitted(&mut self, name: &str) -> Result<bool> {
        debug!("Checking active configuration for p2p interface");
        match self.store.section_exists(INTERFACE_SECTION, name).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(error = %e, "Failed to read interface configuration");
                self.metrics.record_store_failure();
                Err(e)
            }
        }
    }

    async fn admit(&mut self, name: &str) -> Result<()> {
        let path = SectionPath::interface(name).to_string();
        info!(path, "Adding group interface");

        if let Err(e) = self.store.set_entry(&path).await {
            warn!(error = %e, "Failed to add group interface");
            self.metrics.record_store_failure();
            return Err(e);
        }
        self.commit().await?;
        self.metrics.record_admission();
        Ok(())
    }

    async fn withdraw(&mut self, name: &str) -> Result<()> {
        let path = SectionPath::interface(name).to_string();
        info!(path, "Removing group interface");

        if let Err(e) = self.store.remove_entry(&path).await {
            warn!(error = %e, "Failed to remove group interface");
            self.metrics.record_store_failure();
            return Err(e);
        }
        self.commit().await?;
        self.metrics.record_withdrawal();
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.store.commit().await.map_err(|e| {
            warn!(error = %e, "Failed to commit configuration");
            self.metrics.record_store_failure();
            e
        })
    }
}
