//! p2psyncd event loop
//!
//! A single task owns the netlink socket and the reconciliation engine, so
//! events are reconciled strictly one after another. Besides kernel
//! notifications the loop reacts to:
//! - SIGHUP: reload `control_interface`, re-query links if it changed
//! - SIGUSR1: interface topology changed, re-query links
//! - the periodic resync timer: re-query links
//! - SIGTERM / SIGINT: exit

use crate::config_db::ConfigStore;
use crate::config_file::P2pSyncConfig;
use crate::control_config::ControlConfigListener;
use crate::error::Result;
use crate::link_event::LinkNotice;
use crate::link_sync::GroupLinkSync;
use crate::metrics::MetricsCollector;
use crate::netlink_socket::NetlinkSocket;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingDump {
    seq: u32,
    deadline: Instant,
}

/// Tracks the outstanding link dump request
///
/// Only the most recent request is tracked. A dump ends with a `DumpDone`
/// or an error reply carrying its sequence number. A dump that misses its
/// deadline is dropped without retry.
#[derive(Debug)]
pub struct DumpTracker {
    timeout: Duration,
    pending: Option<PendingDump>,
}

impl DumpTracker {
    /// Track dumps that must complete within `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: None,
        }
    }

    /// Record a dump request sent with `seq`
    pub fn start(&mut self, seq: u32) {
        if let Some(previous) = self.pending {
            debug!(seq = previous.seq, "Superseding link dump");
        }
        self.pending = Some(PendingDump {
            seq,
            deadline: Instant::now() + self.timeout,
        });
    }

    /// Sequence number of the outstanding dump
    pub fn pending_seq(&self) -> Option<u32> {
        self.pending.map(|d| d.seq)
    }

    /// Deadline of the outstanding dump
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|d| d.deadline)
    }

    /// Clear the outstanding dump if `notice` terminates it
    ///
    /// Returns true if the dump was cleared.
    pub fn observe(&mut self, notice: &LinkNotice) -> bool {
        let seq = match notice {
            LinkNotice::DumpDone { seq } | LinkNotice::Error { seq, .. } => *seq,
            LinkNotice::Link(_) => return false,
        };
        if self.pending_seq() == Some(seq) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Wait until the outstanding dump expires, forever if there is none
    pub async fn expired(&self) {
        match self.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Drop the outstanding dump after its deadline, counting the timeout
    ///
    /// Returns the sequence number of the abandoned dump.
    pub fn expire(&mut self, metrics: &MetricsCollector) -> Option<u32> {
        let dump = self.pending.take()?;
        warn!(seq = dump.seq, "Netlink link dump timeout");
        metrics.record_netlink_error();
        Some(dump.seq)
    }
}

/// Daemon state driven by [`P2pSyncDaemon::run`]
pub struct P2pSyncDaemon<S: ConfigStore> {
    sync: GroupLinkSync<S>,
    netlink: NetlinkSocket,
    listener: ControlConfigListener,
    resync_interval: Option<Duration>,
    dumps: DumpTracker,
}

impl<S: ConfigStore> P2pSyncDaemon<S> {
    /// Create the daemon, opening the netlink socket
    pub fn new(
        sync: GroupLinkSync<S>,
        listener: ControlConfigListener,
        config: &P2pSyncConfig,
    ) -> Result<Self> {
        let netlink = NetlinkSocket::new()?;
        Ok(Self {
            sync,
            netlink,
            listener,
            resync_interval: config.resync_interval(),
            dumps: DumpTracker::new(config.dump_timeout()),
        })
    }

    /// Run until SIGTERM or SIGINT
    pub async fn run(mut self) -> Result<()> {
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut resync = self.resync_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        self.query_links();
        if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
            debug!(error = %e, "systemd notification failed");
        }
        info!(
            control_interface = %self.sync.control_interface(),
            "Listening to link events"
        );

        loop {
            tokio::select! {
                received = self.netlink.recv_notices() => match received {
                    Ok(notices) => {
                        for notice in notices {
                            self.dumps.observe(&notice);
                            self.sync.handle_notice(&notice).await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Error receiving link events");
                        self.sync.metrics().record_netlink_error();
                    }
                },
                _ = sighup.recv() => {
                    info!(path = %self.listener.path().display(), "Reloading configuration");
                    if self.listener.apply(&mut self.sync) {
                        self.query_links();
                    }
                }
                _ = sigusr1.recv() => {
                    debug!("Interfaces changed, trigger query");
                    self.query_links();
                }
                _ = tick(&mut resync) => {
                    debug!("Periodic link resync");
                    self.query_links();
                }
                _ = self.dumps.expired() => {
                    self.dumps.expire(self.sync.metrics());
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT");
                    break;
                }
            }
        }

        // An unfinished dump is abandoned
        if let Some(seq) = self.dumps.pending_seq() {
            debug!(seq, "Abandoning link dump");
        }
        let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);
        Ok(())
    }

    fn query_links(&mut self) {
        match self.netlink.request_link_dump() {
            Ok(seq) => self.dumps.start(seq),
            Err(e) => {
                warn!(error = %e, "Failed to query interface links");
                self.sync.metrics().record_netlink_error();
            }
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_event::LinkEvent;

    const TIMEOUT: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn test_start_sets_deadline() {
        let mut dumps = DumpTracker::new(TIMEOUT);
        assert_eq!(dumps.pending_seq(), None);

        let now = Instant::now();
        dumps.start(1);
        assert_eq!(dumps.pending_seq(), Some(1));
        assert_eq!(dumps.deadline(), Some(now + TIMEOUT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_done_clears_dump() {
        let mut dumps = DumpTracker::new(TIMEOUT);
        dumps.start(3);

        assert!(!dumps.observe(&LinkNotice::Link(LinkEvent::new_link(3, "eth0", true))));
        assert!(!dumps.observe(&LinkNotice::DumpDone { seq: 4 }));
        assert_eq!(dumps.pending_seq(), Some(3));

        assert!(dumps.observe(&LinkNotice::DumpDone { seq: 3 }));
        assert_eq!(dumps.pending_seq(), None);
        assert_eq!(dumps.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_error_clears_dump() {
        let mut dumps = DumpTracker::new(TIMEOUT);
        dumps.start(5);

        assert!(!dumps.observe(&LinkNotice::Error { seq: 6, code: -16 }));
        assert!(dumps.observe(&LinkNotice::Error { seq: 5, code: -16 }));
        assert_eq!(dumps.pending_seq(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_supersedes_pending() {
        let mut dumps = DumpTracker::new(TIMEOUT);
        dumps.start(1);
        tokio::time::advance(Duration::from_millis(500)).await;
        dumps.start(2);

        assert!(!dumps.observe(&LinkNotice::DumpDone { seq: 1 }));
        assert_eq!(dumps.pending_seq(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counted_once_without_retry() {
        let metrics = MetricsCollector::new().unwrap();
        let mut dumps = DumpTracker::new(TIMEOUT);
        let start = Instant::now();
        dumps.start(7);

        dumps.expired().await;
        assert!(Instant::now() >= start + TIMEOUT);
        assert_eq!(dumps.expire(&metrics), Some(7));
        assert_eq!(metrics.netlink_errors(), 1.0);

        assert_eq!(dumps.pending_seq(), None);
        assert_eq!(dumps.expire(&metrics), None);
        assert_eq!(metrics.netlink_errors(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_dump_never_expires() {
        let mut dumps = DumpTracker::new(TIMEOUT);
        dumps.start(9);
        dumps.observe(&LinkNotice::DumpDone { seq: 9 });

        let waited = tokio::time::timeout(TIMEOUT * 2, dumps.expired()).await;
        assert!(waited.is_err());
    }
}
