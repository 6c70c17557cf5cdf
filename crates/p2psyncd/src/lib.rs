//! Peer-group Link Synchronization Daemon
//!
//! Watches kernel link notifications for P2P group interfaces created under a
//! control interface (`p2p-<control>-<n>`) and keeps their `INTERFACE` entries
//! in CONFIG_DB in step with their administrative state. A group interface is
//! admitted while it is up and withdrawn once it goes down or disappears.

pub mod config_db;
pub mod config_file;
pub mod control_config;
#[cfg(target_os = "linux")]
pub mod daemon;
pub mod error;
pub mod group_matcher;
pub mod link_event;
pub mod link_sync;
pub mod metrics;
pub mod netlink_socket;
pub mod redis_adapter;
pub mod tables;

pub use config_db::{ConfigStore, MemoryConfigStore, SectionPath};
pub use config_file::{DEFAULT_CONFIG_PATH, P2pSyncConfig};
pub use control_config::ControlConfigListener;
#[cfg(target_os = "linux")]
pub use daemon::{DumpTracker, P2pSyncDaemon};
pub use error::*;
pub use group_matcher::{ControlInterface, GroupNamePattern, matches};
pub use link_event::{LinkEvent, LinkEventKind, LinkNotice};
pub use link_sync::{GroupLinkSync, SyncAction};
pub use metrics::{MetricsCollector, serve_metrics};
#[cfg(target_os = "linux")]
pub use netlink_socket::NetlinkSocket;
pub use redis_adapter::RedisConfigStore;
