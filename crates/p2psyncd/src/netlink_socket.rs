//! Kernel netlink socket for link state notifications
//!
//! Joins RTNLGRP_LINK on a NETLINK_ROUTE socket and turns RTM_NEWLINK /
//! RTM_DELLINK messages into [`LinkNotice`]s. The same socket sends the
//! RTM_GETLINK dump request, so dump replies arrive on the regular event
//! path.

#[cfg(target_os = "linux")]
mod linux {
    use crate::error::{P2pSyncError, Result};
    use crate::link_event::{LinkEvent, LinkEventKind, LinkNotice};
    use netlink_packet_core::{
        NLM_F_DUMP, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage, NetlinkPayload,
    };
    use netlink_packet_route::RouteNetlinkMessage;
    use netlink_packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
    use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
    use tokio::io::unix::AsyncFd;
    use tracing::{debug, instrument, trace};

    /// Netlink group for link notifications
    const RTNLGRP_LINK: u32 = 1;

    /// Receive buffer capacity, large enough for a dump datagram
    const RECV_BUFFER_SIZE: usize = 64 * 1024;

    /// Async netlink socket subscribed to link notifications
    pub struct NetlinkSocket {
        inner: AsyncFd<Socket>,
        buffer: Vec<u8>,
        next_seq: u32,
    }

    impl NetlinkSocket {
        /// Create, bind and subscribe a new netlink socket
        #[instrument]
        pub fn new() -> Result<Self> {
            let mut socket = Socket::new(NETLINK_ROUTE)
                .map_err(|e| P2pSyncError::Netlink(format!("Failed to create socket: {}", e)))?;

            let groups = 1 << (RTNLGRP_LINK - 1);
            socket
                .bind(&SocketAddr::new(0, groups))
                .map_err(|e| P2pSyncError::Netlink(format!("Failed to bind socket: {}", e)))?;
            socket.set_non_blocking(true).map_err(|e| {
                P2pSyncError::Netlink(format!("Failed to set non-blocking: {}", e))
            })?;

            let inner = AsyncFd::new(socket)
                .map_err(|e| P2pSyncError::Netlink(format!("Failed to create AsyncFd: {}", e)))?;

            debug!("Netlink socket bound to RTNLGRP_LINK");
            Ok(Self {
                inner,
                buffer: Vec::with_capacity(RECV_BUFFER_SIZE),
                next_seq: 1,
            })
        }

        /// Request a dump of all links
        ///
        /// Returns the sequence number carried by the replies.
        #[instrument(skip(self))]
        pub fn request_link_dump(&mut self) -> Result<u32> {
            let seq = self.next_seq;
            self.next_seq = self.next_seq.wrapping_add(1);

            let mut header = NetlinkHeader::default();
            header.flags = NLM_F_REQUEST | NLM_F_DUMP;
            header.sequence_number = seq;

            let payload = RouteNetlinkMessage::GetLink(LinkMessage::default());
            let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(payload));
            packet.finalize();

            let mut buf = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut buf);

            self.inner
                .get_ref()
                .send_to(&buf, &SocketAddr::new(0, 0), 0)
                .map_err(|e| {
                    P2pSyncError::Netlink(format!("Failed to send link dump request: {}", e))
                })?;

            debug!(seq, "Querying interface link data");
            Ok(seq)
        }

        /// Wait for the next datagram and parse every notice it carries
        pub async fn recv_notices(&mut self) -> Result<Vec<LinkNotice>> {
            loop {
                let mut guard = self.inner.readable().await.map_err(|e| {
                    P2pSyncError::Netlink(format!("AsyncFd readable error: {}", e))
                })?;

                self.buffer.clear();
                let buffer = &mut self.buffer;
                match guard.try_io(|inner| inner.get_ref().recv(buffer, 0)) {
                    Ok(Ok(_)) => return Ok(parse_notices(&self.buffer)),
                    Ok(Err(e)) => {
                        return Err(P2pSyncError::Netlink(format!("Failed to receive: {}", e)));
                    }
                    Err(_would_block) => continue,
                }
            }
        }
    }

    /// Parse all netlink messages in `buf`
    ///
    /// Messages that are not link notifications, done markers or error
    /// replies are skipped.
    pub fn parse_notices(buf: &[u8]) -> Vec<LinkNotice> {
        let mut notices = Vec::new();
        let mut offset = 0;

        while offset < buf.len() {
            let msg = match NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf[offset..]) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(error = %e, offset, "Failed to parse netlink message");
                    break;
                }
            };

            let len = msg.header.length as usize;
            if len == 0 {
                break;
            }
            // Align to 4 bytes (netlink alignment requirement)
            offset += (len + 3) & !3;

            if let Some(notice) = to_notice(msg) {
                notices.push(notice);
            }
        }

        trace!(count = notices.len(), "Received link notices");
        notices
    }

    fn to_notice(msg: NetlinkMessage<RouteNetlinkMessage>) -> Option<LinkNotice> {
        let seq = msg.header.sequence_number;
        match msg.payload {
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewLink(link)) => {
                link_event(link, LinkEventKind::NewLink).map(LinkNotice::Link)
            }
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::DelLink(link)) => {
                link_event(link, LinkEventKind::DelLink).map(LinkNotice::Link)
            }
            NetlinkPayload::Done(_) => Some(LinkNotice::DumpDone { seq }),
            NetlinkPayload::Error(err) => err.code.map(|code| LinkNotice::Error {
                seq,
                code: code.get(),
            }),
            _ => None,
        }
    }

    fn link_event(link: LinkMessage, kind: LinkEventKind) -> Option<LinkEvent> {
        let ifindex = link.header.index;
        let is_up = link.header.flags.contains(LinkFlags::Up);

        let name = link.attributes.into_iter().find_map(|attr| match attr {
            LinkAttribute::IfName(name) => Some(name),
            _ => None,
        });
        let name = match name {
            Some(name) => name,
            None => match resolve_ifname(ifindex) {
                Ok(name) => name,
                Err(e) => {
                    debug!(error = %e, "Dropping link message without a name");
                    return None;
                }
            },
        };

        Some(LinkEvent {
            ifindex,
            name,
            kind,
            is_up: is_up && kind == LinkEventKind::NewLink,
        })
    }

    /// Resolve an interface index to its current name
    pub fn resolve_ifname(ifindex: u32) -> Result<String> {
        nix::net::if_::if_indextoname(ifindex)
            .map(|name| name.to_string_lossy().into_owned())
            .map_err(|_| P2pSyncError::InterfaceNotFound(ifindex))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn serialize_link(
            message: fn(LinkMessage) -> RouteNetlinkMessage,
            index: u32,
            flags: LinkFlags,
            name: &str,
        ) -> Vec<u8> {
            let mut link = LinkMessage::default();
            link.header.index = index;
            link.header.flags = flags;
            link.attributes.push(LinkAttribute::IfName(name.to_string()));

            let mut packet = NetlinkMessage::new(
                NetlinkHeader::default(),
                NetlinkPayload::InnerMessage(message(link)),
            );
            packet.finalize();
            let mut buf = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut buf);
            buf
        }

        #[test]
        fn test_parse_newlink_up() {
            let buf = serialize_link(
                RouteNetlinkMessage::NewLink,
                7,
                LinkFlags::Up,
                "p2p-wlan0-1",
            );
            let notices = parse_notices(&buf);
            assert_eq!(
                notices,
                vec![LinkNotice::Link(LinkEvent::new_link(7, "p2p-wlan0-1", true))]
            );
        }

        #[test]
        fn test_parse_newlink_down() {
            let buf = serialize_link(
                RouteNetlinkMessage::NewLink,
                7,
                LinkFlags::empty(),
                "p2p-wlan0-1",
            );
            let notices = parse_notices(&buf);
            assert_eq!(
                notices,
                vec![LinkNotice::Link(LinkEvent::new_link(7, "p2p-wlan0-1", false))]
            );
        }

        #[test]
        fn test_parse_dellink() {
            let buf = serialize_link(
                RouteNetlinkMessage::DelLink,
                9,
                LinkFlags::Up,
                "p2p-wlan0-2",
            );
            let notices = parse_notices(&buf);
            assert_eq!(
                notices,
                vec![LinkNotice::Link(LinkEvent::del_link(9, "p2p-wlan0-2"))]
            );
        }

        #[test]
        fn test_parse_multiple_messages() {
            let mut buf = serialize_link(RouteNetlinkMessage::NewLink, 1, LinkFlags::Up, "eth0");
            buf.extend(serialize_link(
                RouteNetlinkMessage::NewLink,
                2,
                LinkFlags::Up,
                "p2p-wlan0-0",
            ));
            let notices = parse_notices(&buf);
            assert_eq!(notices.len(), 2);
        }

        #[test]
        fn test_parse_newlink_without_name_resolves_index() {
            let mut link = LinkMessage::default();
            link.header.index = 1;
            link.header.flags = LinkFlags::Up;

            let mut packet = NetlinkMessage::new(
                NetlinkHeader::default(),
                NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewLink(link)),
            );
            packet.finalize();
            let mut buf = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut buf);

            // Index 1 is the loopback device
            assert_eq!(
                parse_notices(&buf),
                vec![LinkNotice::Link(LinkEvent::new_link(1, "lo", true))]
            );
        }

        #[test]
        fn test_resolve_unknown_index() {
            assert!(matches!(
                resolve_ifname(u32::MAX),
                Err(P2pSyncError::InterfaceNotFound(u32::MAX))
            ));
        }

        #[test]
        fn test_parse_garbage() {
            assert!(parse_notices(&[0u8; 8]).is_empty());
            assert!(parse_notices(&[]).is_empty());
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::{NetlinkSocket, parse_notices, resolve_ifname};
