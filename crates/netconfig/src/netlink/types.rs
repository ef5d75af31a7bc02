//! Fixed-size rtnetlink headers and attribute identifiers.
//!
//! Values are from `linux/if_link.h`, `linux/if_addr.h` and
//! `linux/rtnetlink.h`; only the ones the reconciler sends or reads.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Adds `SIZE` and an owned, alignment-free `from_bytes` to a kernel header.
macro_rules! kernel_header {
    ($($ty:ident),+) => {$(
        impl $ty {
            pub const SIZE: usize = std::mem::size_of::<Self>();

            pub fn from_bytes(data: &[u8]) -> Result<Self> {
                Self::read_from_prefix(data)
                    .map(|(header, _)| header)
                    .map_err(|_| Error::Truncated {
                        expected: Self::SIZE,
                        actual: data.len(),
                    })
            }
        }
    )+};
}

/// `struct ifinfomsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub __ifi_pad: u8,
    /// ARPHRD_*.
    pub ifi_type: u16,
    pub ifi_index: i32,
    /// IFF_* flags.
    pub ifi_flags: u32,
    /// Which bits of `ifi_flags` a SETLINK request changes.
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(self, index: i32) -> Self {
        Self {
            ifi_index: index,
            ..self
        }
    }
}

/// `struct ifaddrmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

/// `struct rtmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    pub rtm_family: u8,
    pub rtm_dst_len: u8,
    pub rtm_src_len: u8,
    pub rtm_tos: u8,
    pub rtm_table: u8,
    pub rtm_protocol: u8,
    pub rtm_scope: u8,
    pub rtm_type: u8,
    pub rtm_flags: u32,
}

kernel_header!(IfInfoMsg, IfAddrMsg, RtMsg);

pub mod iff {
    pub const UP: u32 = 0x1;
    pub const BROADCAST: u32 = 0x2;
}

pub mod ifla {
    pub const ADDRESS: u16 = 1;
    pub const IFNAME: u16 = 3;
    pub const PERM_ADDRESS: u16 = 54;
}

pub mod ifa {
    pub const ADDRESS: u16 = 1;
    pub const LOCAL: u16 = 2;
    pub const BROADCAST: u16 = 4;
}

pub mod rta {
    pub const DST: u16 = 1;
    pub const OIF: u16 = 4;
    pub const GATEWAY: u16 = 5;
    pub const PREFSRC: u16 = 7;
    pub const TABLE: u16 = 15;
}

pub mod rtn {
    pub const UNICAST: u8 = 1;
}

pub mod rt_table {
    pub const MAIN: u8 = 254;
}

/// Who installed a route.
pub mod rtprot {
    pub const KERNEL: u8 = 2;
    pub const BOOT: u8 = 3;
    pub const STATIC: u8 = 4;
    pub const DHCP: u8 = 16;
}

pub mod rt_scope {
    pub const UNIVERSE: u8 = 0;
    pub const LINK: u8 = 253;
    pub const HOST: u8 = 254;
}
