//! Non-blocking NETLINK_ROUTE socket driven by the tokio reactor.

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::error::Result;

/// One dump chunk from the kernel fits comfortably.
const RECV_BUF_SIZE: usize = 32 * 1024;

pub struct NetlinkSocket {
    fd: AsyncFd<Socket>,
    seq: AtomicU32,
    /// Port id the kernel bound us to.
    pid: u32,
}

impl NetlinkSocket {
    pub fn new() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;

        // Not supported before 4.12
        if let Err(e) = socket.set_ext_ack(true) {
            tracing::debug!(error = %e, "extended ACK unavailable");
        }

        Ok(Self {
            pid: addr.port_number(),
            fd: AsyncFd::new(socket)?,
            seq: AtomicU32::new(1),
        })
    }

    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        self.fd
            .async_io(Interest::WRITABLE, |socket| socket.send(msg, 0))
            .await?;
        Ok(())
    }

    /// Receive one datagram.
    pub async fn recv_msg(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(RECV_BUF_SIZE);
        self.fd
            .async_io(Interest::READABLE, |socket| socket.recv(&mut buf, 0))
            .await?;
        Ok(buf.to_vec())
    }
}
