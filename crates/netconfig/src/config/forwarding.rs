//! Port-forwarding declarations (`portforwardings.json`).

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use winnow::ascii::digit1;
use winnow::combinator::{opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;

use crate::error::{self, Error};

type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Transport protocol of a forwarding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    #[default]
    Tcp,
    Udp,
}

impl Proto {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single port or an inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortSpec {
    Single(u16),
    /// Inclusive; `lo <= hi` always holds.
    Range(u16, u16),
}

impl PortSpec {
    /// Distance between the range bounds; zero for a single port.
    pub fn span(&self) -> u16 {
        match *self {
            Self::Single(_) => 0,
            Self::Range(lo, hi) => hi - lo,
        }
    }

    pub fn first(&self) -> u16 {
        match *self {
            Self::Single(p) | Self::Range(p, _) => p,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range(..))
    }
}

fn port(input: &mut &str) -> PResult<u16> {
    digit1.try_map(str::parse::<u16>).parse_next(input)
}

fn port_spec(input: &mut &str) -> PResult<PortSpec> {
    (port, opt(preceded('-', port)))
        .verify_map(|(lo, hi)| match hi {
            None => Some(PortSpec::Single(lo)),
            Some(hi) if lo <= hi => Some(PortSpec::Range(lo, hi)),
            Some(_) => None,
        })
        .parse_next(input)
}

/// Error for a malformed port specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid port specification {0:?}: expected PORT or LOW-HIGH")]
pub struct PortSpecError(pub String);

impl FromStr for PortSpec {
    type Err = PortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        port_spec
            .parse(s.trim())
            .map_err(|_| PortSpecError(s.to_string()))
    }
}

impl TryFrom<String> for PortSpec {
    type Error = PortSpecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PortSpec> for String {
    fn from(spec: PortSpec) -> String {
        spec.to_string()
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(p) => write!(f, "{}", p),
            Self::Range(lo, hi) => write!(f, "{}-{}", lo, hi),
        }
    }
}

/// One inbound mapping from the uplink to an internal host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForwarding {
    #[serde(default)]
    pub proto: Proto,
    pub port: PortSpec,
    pub dest_addr: IpAddr,
    pub dest_port: PortSpec,
}

impl PortForwarding {
    /// Reject port pairs the kernel cannot translate: ranges of different
    /// sizes, and a single port mapped onto a range.
    pub fn validate(&self) -> error::Result<()> {
        let mismatch = match (self.port, self.dest_port) {
            (PortSpec::Range(..), PortSpec::Range(..)) => {
                self.port.span() != self.dest_port.span()
            }
            (PortSpec::Single(_), PortSpec::Range(..)) => true,
            _ => false,
        };

        if mismatch {
            return Err(Error::RangeMismatch {
                port: self.port.to_string(),
                dest_port: self.dest_port.to_string(),
            });
        }
        Ok(())
    }
}

/// Top-level shape of `portforwardings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingsDocument {
    #[serde(default)]
    pub forwardings: Vec<PortForwarding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_spec() {
        assert_eq!("8080".parse::<PortSpec>().unwrap(), PortSpec::Single(8080));
        assert_eq!(
            "8040-8060".parse::<PortSpec>().unwrap(),
            PortSpec::Range(8040, 8060)
        );
        assert_eq!("8040-8060".parse::<PortSpec>().unwrap().span(), 20);
        assert_eq!("53-53".parse::<PortSpec>().unwrap(), PortSpec::Range(53, 53));
    }

    #[test]
    fn test_reject_bad_port_spec() {
        for bad in ["", "http", "70000", "8060-8040", "80-", "-80", "80-90-100", "80 90"] {
            assert!(bad.parse::<PortSpec>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_forwarding_defaults_to_tcp() {
        let doc: ForwardingsDocument = serde_json::from_str(
            r#"{"forwardings":[
                {"port":"8080","dest_addr":"192.168.42.23","dest_port":"9999"},
                {"proto":"udp","port":"53","dest_addr":"192.168.42.99","dest_port":"53"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(doc.forwardings.len(), 2);
        assert_eq!(doc.forwardings[0].proto, Proto::Tcp);
        assert_eq!(doc.forwardings[0].dest_port, PortSpec::Single(9999));
        assert_eq!(doc.forwardings[1].proto, Proto::Udp);
    }

    #[test]
    fn test_forwarding_missing_dest_is_error() {
        let res = serde_json::from_str::<ForwardingsDocument>(
            r#"{"forwardings":[{"port":"8080","dest_port":"9999"}]}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_validate_port_pairs() {
        let entry = |port: &str, dest_port: &str| PortForwarding {
            proto: Proto::Tcp,
            port: port.parse().unwrap(),
            dest_addr: "192.168.42.99".parse().unwrap(),
            dest_port: dest_port.parse().unwrap(),
        };

        for (port, dest_port) in [("8040-8060", "9040-9060"), ("5000-5010", "5000"), ("53", "53")] {
            assert!(entry(port, dest_port).validate().is_ok(), "{port} -> {dest_port}");
        }
        for (port, dest_port) in [("8040-8060", "9000-9001"), ("8040", "8040-8050")] {
            assert!(matches!(
                entry(port, dest_port).validate(),
                Err(Error::RangeMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_proto_is_error() {
        let res = serde_json::from_str::<PortForwarding>(
            r#"{"proto":"sctp","port":"1","dest_addr":"10.0.0.1","dest_port":"1"}"#,
        );
        assert!(res.is_err());
    }
}
