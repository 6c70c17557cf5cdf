//! Table and section name constants for p2psyncd.

/// Configuration section type for routed interfaces.
pub const INTERFACE_SECTION: &str = "interface";

/// CONFIG_DB table backing [`INTERFACE_SECTION`].
pub const CFG_INTERFACE_TABLE_NAME: &str = "INTERFACE";

/// Separator between table name and key in CONFIG_DB.
pub const TABLE_KEY_SEPARATOR: char = '|';

/// Field/value written for entries that carry no attributes.
pub const NULL_FIELD: &str = "NULL";

/// Prefix every peer-group interface name starts with.
pub const GROUP_PREFIX: &str = "p2p-";

/// Control interface value that tracks groups of any control interface.
pub const ANY_CONTROL_INTERFACE: &str = "all";

/// Maximum interface name length (IFNAMSIZ without the NUL).
pub const MAX_IFNAME_LEN: usize = 15;
