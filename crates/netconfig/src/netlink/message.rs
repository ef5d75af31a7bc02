//! `nlmsghdr` framing.
//!
//! A datagram from the kernel holds one or more messages, each a 16-byte
//! header followed by a payload and padded to four bytes. [`MessageIter`]
//! walks those frames; [`classify`] turns one into a [`Reply`].

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Round `len` up to the four-byte message alignment.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + 3) & !3
}

pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// `struct nlmsghdr`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Header for an empty message. Length covers the header only.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    pub fn as_bytes(&self) -> &[u8] {
        IntoBytes::as_bytes(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        prefix(data)
    }
}

fn prefix<T: FromBytes + KnownLayout + Immutable>(data: &[u8]) -> Result<&T> {
    T::ref_from_prefix(data)
        .map(|(value, _)| value)
        .map_err(|_| Error::Truncated {
            expected: std::mem::size_of::<T>(),
            actual: data.len(),
        })
}

/// Message types this crate sends or expects back.
pub struct NlMsgType;

impl NlMsgType {
    pub const ERROR: u16 = 2;
    pub const DONE: u16 = 3;

    pub const RTM_NEWLINK: u16 = 16;
    pub const RTM_GETLINK: u16 = 18;
    pub const RTM_SETLINK: u16 = 19;
    pub const RTM_NEWADDR: u16 = 20;
    pub const RTM_GETADDR: u16 = 22;
    pub const RTM_NEWROUTE: u16 = 24;
    pub const RTM_DELROUTE: u16 = 25;
    pub const RTM_GETROUTE: u16 = 26;

    /// Request name for timeouts and error context.
    pub fn name(msg_type: u16) -> &'static str {
        match msg_type {
            Self::RTM_NEWLINK => "RTM_NEWLINK",
            Self::RTM_GETLINK => "RTM_GETLINK",
            Self::RTM_SETLINK => "RTM_SETLINK",
            Self::RTM_NEWADDR => "RTM_NEWADDR",
            Self::RTM_GETADDR => "RTM_GETADDR",
            Self::RTM_NEWROUTE => "RTM_NEWROUTE",
            Self::RTM_DELROUTE => "RTM_DELROUTE",
            Self::RTM_GETROUTE => "RTM_GETROUTE",
            _ => "netlink request",
        }
    }
}

pub const NLM_F_REQUEST: u16 = 0x001;
pub const NLM_F_ACK: u16 = 0x004;
/// `NLM_F_ROOT | NLM_F_MATCH`.
pub const NLM_F_DUMP: u16 = 0x300;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

/// Payload of an `NLMSG_ERROR` message. `error == 0` is an ACK.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    pub error: i32,
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        prefix(data)
    }

    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

/// One framed message borrowed from a receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub header: &'a NlMsgHdr,
    pub payload: &'a [u8],
}

/// Walks the frames of a datagram. A bad length ends the walk with an error.
pub struct MessageIter<'a> {
    rest: &'a [u8],
}

impl<'a> MessageIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < NLMSG_HDRLEN {
            return None;
        }
        let data = std::mem::take(&mut self.rest);

        let header = match NlMsgHdr::from_bytes(data) {
            Ok(header) => header,
            Err(e) => return Some(Err(e)),
        };
        let len = header.nlmsg_len as usize;
        if !(NLMSG_HDRLEN..=data.len()).contains(&len) {
            return Some(Err(Error::InvalidMessage(format!(
                "message length {} outside buffer of {} bytes",
                len,
                data.len()
            ))));
        }

        self.rest = data.get(nlmsg_align(len)..).unwrap_or_default();
        Some(Ok(Frame {
            header,
            payload: &data[NLMSG_HDRLEN..len],
        }))
    }
}

/// What a frame means to a waiting request.
#[derive(Debug)]
pub enum Reply<'a> {
    /// A dump entry.
    Data(Frame<'a>),
    /// End of a dump.
    Done,
    /// Positive acknowledgement.
    Ack,
    /// The kernel refused the request.
    Failed(Error),
}

/// Interpret one frame.
pub fn classify(frame: Frame<'_>) -> Result<Reply<'_>> {
    if frame.header.is_done() {
        return Ok(Reply::Done);
    }
    if !frame.header.is_error() {
        return Ok(Reply::Data(frame));
    }
    let err = NlMsgError::from_bytes(frame.payload)?;
    Ok(if err.is_ack() {
        Reply::Ack
    } else {
        Reply::Failed(Error::from_errno(err.error))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(msg_type: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut hdr = NlMsgHdr::new(msg_type, 0);
        hdr.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
        hdr.nlmsg_seq = seq;
        let mut buf = hdr.as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(nlmsg_align(buf.len()), 0);
        buf
    }

    fn error_payload(errno: i32) -> Vec<u8> {
        let mut payload = errno.to_ne_bytes().to_vec();
        payload.extend_from_slice(NlMsgHdr::new(NlMsgType::RTM_NEWADDR, 0).as_bytes());
        payload
    }

    #[test]
    fn test_iterates_batched_messages() {
        let mut data = message(NlMsgType::RTM_NEWLINK, 7, &[1, 2, 3]);
        data.extend(message(NlMsgType::DONE, 7, &[0, 0, 0, 0]));

        let frames: Vec<_> = MessageIter::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].header.nlmsg_type, NlMsgType::RTM_NEWLINK);
        assert_eq!(frames[0].payload, &[1, 2, 3]);
        assert!(matches!(classify(frames[1]).unwrap(), Reply::Done));
    }

    #[test]
    fn test_rejects_bogus_length() {
        let mut data = message(NlMsgType::RTM_NEWLINK, 1, &[]);
        data[0] = 0xff;
        let mut iter = MessageIter::new(&data);
        assert!(matches!(iter.next(), Some(Err(Error::InvalidMessage(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_classify_error_and_ack() {
        let failed = message(NlMsgType::ERROR, 1, &error_payload(-libc::EEXIST));
        let frame = MessageIter::new(&failed).next().unwrap().unwrap();
        match classify(frame).unwrap() {
            Reply::Failed(e) => assert!(e.is_already_exists()),
            other => panic!("unexpected: {other:?}"),
        }

        let ack = message(NlMsgType::ERROR, 1, &error_payload(0));
        let frame = MessageIter::new(&ack).next().unwrap().unwrap();
        assert!(matches!(classify(frame).unwrap(), Reply::Ack));
    }

    #[test]
    fn test_truncated_error_payload() {
        let data = message(NlMsgType::ERROR, 1, &[0, 0]);
        let frame = MessageIter::new(&data).next().unwrap().unwrap();
        assert!(matches!(classify(frame), Err(Error::Truncated { .. })));
    }
}
