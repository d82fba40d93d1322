use core::fmt;
use core::str::FromStr;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

/// Classification of an IPv4 protocol number.
///
/// Drives both transport decoder dispatch and filter matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl From<u8> for Protocol {
    fn from(value: u8) -> Self {
        match value {
            IPPROTO_ICMP => Protocol::Icmp,
            IPPROTO_TCP => Protocol::Tcp,
            IPPROTO_UDP => Protocol::Udp,
            other => Protocol::Other(other),
        }
    }
}

impl Protocol {
    pub fn number(&self) -> u8 {
        match self {
            Protocol::Icmp => IPPROTO_ICMP,
            Protocol::Tcp => IPPROTO_TCP,
            Protocol::Udp => IPPROTO_UDP,
            Protocol::Other(n) => *n,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Other(n) => write!(f, "Other({})", n),
        }
    }
}

/// User-selectable protocol filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFilter {
    Tcp,
    Udp,
    Icmp,
}

impl ProtocolFilter {
    pub fn matches(&self, protocol: Protocol) -> bool {
        matches!(
            (self, protocol),
            (ProtocolFilter::Tcp, Protocol::Tcp)
                | (ProtocolFilter::Udp, Protocol::Udp)
                | (ProtocolFilter::Icmp, Protocol::Icmp)
        )
    }
}

impl fmt::Display for ProtocolFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFilter::Tcp => write!(f, "TCP"),
            ProtocolFilter::Udp => write!(f, "UDP"),
            ProtocolFilter::Icmp => write!(f, "ICMP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFilterError;

impl fmt::Display for ParseFilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol filter must be one of TCP, UDP, ICMP")
    }
}

impl core::error::Error for ParseFilterError {}

impl FromStr for ProtocolFilter {
    type Err = ParseFilterError;

    /// Case-insensitive, exact match on the canonical tag name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("TCP") {
            Ok(ProtocolFilter::Tcp)
        } else if s.eq_ignore_ascii_case("UDP") {
            Ok(ProtocolFilter::Udp)
        } else if s.eq_ignore_ascii_case("ICMP") {
            Ok(ProtocolFilter::Icmp)
        } else {
            Err(ParseFilterError)
        }
    }
}
