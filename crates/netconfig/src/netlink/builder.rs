//! Request assembly.

use zerocopy::{Immutable, IntoBytes};

use super::attr::{NlAttr, nla_align};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// A request under construction: header, then a fixed kernel struct, then
/// attributes. Length, sequence and port id are written by [`finish`].
///
/// [`finish`]: MessageBuilder::finish
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: NlMsgHdr,
    body: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            header: NlMsgHdr::new(msg_type, flags),
            body: Vec::new(),
        }
    }

    pub fn msg_type(&self) -> u16 {
        self.header.nlmsg_type
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.header.nlmsg_seq = seq;
    }

    pub fn set_pid(&mut self, pid: u32) {
        self.header.nlmsg_pid = pid;
    }

    /// Append a kernel struct such as `ifinfomsg`.
    pub fn append<T: IntoBytes + Immutable>(&mut self, data: &T) {
        self.append_bytes(data.as_bytes());
    }

    /// Append bytes already laid out as a kernel struct.
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
        self.body.resize(nlmsg_align(self.body.len()), 0);
    }

    pub fn append_attr(&mut self, attr_type: u16, payload: &[u8]) {
        self.body
            .extend_from_slice(NlAttr::new(attr_type, payload.len()).as_bytes());
        self.body.extend_from_slice(payload);
        self.body.resize(nla_align(self.body.len()), 0);
    }

    pub fn append_attr_u32(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// NUL-terminated, as the kernel expects for names.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) {
        let mut payload = Vec::with_capacity(value.len() + 1);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.append_attr(attr_type, &payload);
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.header.nlmsg_len = (NLMSG_HDRLEN + self.body.len()) as u32;
        let mut msg = Vec::with_capacity(NLMSG_HDRLEN + self.body.len());
        msg.extend_from_slice(self.header.as_bytes());
        msg.resize(NLMSG_HDRLEN, 0);
        msg.extend_from_slice(&self.body);
        msg
    }
}
