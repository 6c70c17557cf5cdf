//! Link state notifications consumed by the reconciliation engine

/// Netlink message type of a link notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEventKind {
    /// RTM_NEWLINK: link created or its attributes changed
    NewLink,
    /// RTM_DELLINK: link removed
    DelLink,
}

/// A single link state change reported by the kernel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEvent {
    /// Kernel interface index
    pub ifindex: u32,
    /// Interface name resolved from the index
    pub name: String,
    /// Message type
    pub kind: LinkEventKind,
    /// IFF_UP set in the link flags
    pub is_up: bool,
}

impl LinkEvent {
    /// Create a new/changed link event
    pub fn new_link(ifindex: u32, name: impl Into<String>, is_up: bool) -> Self {
        Self {
            ifindex,
            name: name.into(),
            kind: LinkEventKind::NewLink,
            is_up,
        }
    }

    /// Create a removed link event
    pub fn del_link(ifindex: u32, name: impl Into<String>) -> Self {
        Self {
            ifindex,
            name: name.into(),
            kind: LinkEventKind::DelLink,
            is_up: false,
        }
    }

    /// Whether this is an RTM_NEWLINK notification
    pub fn is_new_link(&self) -> bool {
        self.kind == LinkEventKind::NewLink
    }

    /// Whether the interface should be admitted after this event
    pub fn wants_admission(&self) -> bool {
        self.is_new_link() && self.is_up
    }
}

/// Anything the link event source can deliver on its socket
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkNotice {
    /// Link notification, unsolicited or part of a dump
    Link(LinkEvent),
    /// End of a multipart dump reply
    DumpDone { seq: u32 },
    /// Kernel error reply for a request
    Error { seq: u32, code: i32 },
}
