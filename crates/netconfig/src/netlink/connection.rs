//! Request/response exchanges over the routing socket.

use std::time::Duration;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NlMsgType, Reply, classify,
};
use super::parse::FromNetlink;
use super::socket::NetlinkSocket;

/// Default time to wait for the kernel to answer a request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Routing netlink connection.
///
/// Every request is bounded by the connection timeout so a wedged kernel
/// interface fails the pass instead of hanging it.
pub struct Connection {
    socket: NetlinkSocket,
    timeout: Duration,
}

impl Connection {
    /// Open a NETLINK_ROUTE connection with the default timeout.
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new()?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request and wait for the kernel's ACK.
    pub async fn request_ack(&self, builder: MessageBuilder) -> Result<()> {
        self.exchange(builder, |reply| match reply {
            Reply::Ack => Ok(true),
            Reply::Failed(e) => Err(e),
            Reply::Data(_) | Reply::Done => Ok(false),
        })
        .await
    }

    /// Send a dump request and collect the payload of every entry.
    pub async fn dump(&self, builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let mut entries = Vec::new();
        self.exchange(builder, |reply| match reply {
            Reply::Data(frame) => {
                entries.push(frame.payload.to_vec());
                Ok(false)
            }
            Reply::Done => Ok(true),
            Reply::Ack => Ok(false),
            Reply::Failed(e) => Err(e),
        })
        .await?;
        Ok(entries)
    }

    /// Dump `msg_type` and parse the entries. Entries that fail to parse
    /// are logged and skipped.
    pub async fn dump_typed<T: FromNetlink>(&self, msg_type: u16) -> Result<Vec<T>> {
        let mut builder = dump_request(msg_type);
        let mut fixed = Vec::new();
        T::write_dump_header(&mut fixed);
        builder.append_bytes(&fixed);

        let entries = self.dump(builder).await?;
        Ok(entries
            .iter()
            .filter_map(|payload| match T::from_bytes(payload) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unparseable dump entry");
                    None
                }
            })
            .collect())
    }

    /// Send one request, then feed every reply carrying its sequence
    /// number to `on_reply` until it reports completion.
    async fn exchange<F>(&self, mut builder: MessageBuilder, mut on_reply: F) -> Result<()>
    where
        F: FnMut(Reply<'_>) -> Result<bool>,
    {
        let operation = NlMsgType::name(builder.msg_type());
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());
        let msg = builder.finish();

        let round_trip = async {
            self.socket.send(&msg).await?;
            loop {
                let datagram = self.socket.recv_msg().await?;
                if feed(&datagram, seq, &mut on_reply)? {
                    return Ok::<(), Error>(());
                }
            }
        };

        bounded(operation, self.timeout, round_trip).await
    }
}

/// Fail with [`Error::Timeout`] naming `operation` if `fut` has not
/// finished after `after`.
async fn bounded<T>(
    operation: &str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::Timeout {
            operation: operation.to_string(),
            after,
        })?
}

/// Hand the frames of one datagram that belong to `seq` to `on_reply`.
/// Frames from earlier, abandoned requests are dropped.
fn feed<F>(datagram: &[u8], seq: u32, on_reply: &mut F) -> Result<bool>
where
    F: FnMut(Reply<'_>) -> Result<bool>,
{
    for frame in MessageIter::new(datagram) {
        let frame = frame?;
        if frame.header.nlmsg_seq != seq {
            continue;
        }
        if on_reply(classify(frame)?)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn dump_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP)
}

pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}
