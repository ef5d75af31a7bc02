//! Async rtnetlink client for the link, address and route operations the
//! reconciler needs.
//!
//! The layering follows the kernel: [`socket`] wraps the raw NETLINK_ROUTE
//! socket, [`message`] and [`attr`] frame the wire format, [`builder`]
//! assembles requests and [`messages`] parses replies into typed structs.
//! [`Connection`] ties them together and bounds every request with a
//! timeout.

pub mod addr;
pub mod attr;
pub mod builder;
pub mod connection;
pub mod error;
pub mod link;
pub mod message;
pub mod messages;
pub mod parse;
pub mod route;
pub mod socket;
pub mod types;

pub use addr::AddressRequest;
pub use connection::{Connection, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use messages::{LinkMessage, RouteMessage};
pub use route::Ipv4Route;
