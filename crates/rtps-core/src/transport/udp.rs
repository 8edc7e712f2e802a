// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport.
//!
//! One socket per participant, shared between the send and listen
//! contexts. The receive timeout keeps the listen context responsive to
//! teardown.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::RECEIVE_TIMEOUT_MS;
use crate::core::types::Locator;

use super::Transport;

/// UDP datagram transport over one bound socket.
pub struct UdpTransport {
    socket: UdpSocket,
    local: Locator,
}

impl UdpTransport {
    /// Bind to `addr` with SO_REUSEADDR and a receive timeout.
    ///
    /// Port 0 lets the OS pick an ephemeral port; the effective address is
    /// reflected in [`Transport::local_locator`].
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;
        socket2.bind(&addr.into())?;

        let socket: UdpSocket = socket2.into();
        socket.set_read_timeout(Some(Duration::from_millis(RECEIVE_TIMEOUT_MS)))?;

        let bound = socket.local_addr()?;
        log::debug!("[UDP] transport bound to {}", bound);

        Ok(Self {
            socket,
            local: Locator::from_socket_addr(&bound),
        })
    }
}

impl Transport for UdpTransport {
    fn send(&self, locator: &Locator, bytes: &[u8]) -> io::Result<usize> {
        let Some(addr) = locator.to_socket_addr() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "locator has no socket address",
            ));
        };
        self.socket.send_to(bytes, addr)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, Locator)> {
        let (len, addr) = self.socket.recv_from(buf)?;
        Ok((len, Locator::from_socket_addr(&addr)))
    }

    fn local_locator(&self) -> Locator {
        self.local
    }
}
