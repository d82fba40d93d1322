//! IPv4 header (20-60 bytes).
//!
//! ```text
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |Version|  IHL  |Type of Service|          Total Length         |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |         Identification        |Flags|      Fragment Offset    |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |  Time to Live |    Protocol   |         Header Checksum       |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                       Source Address                          |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                    Destination Address                        |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::{ByteCursor, DecodeError, Protocol};
use core::net::Ipv4Addr;

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const IPV4_MAX_HEADER_LEN: usize = 60;

const VERSION_SHIFT: u8 = 4;
const IHL_MASK: u8 = 0x0f;
const IHL_WORD_LEN: usize = 4;

const VERSION_IHL_OFFSET: usize = 0;
const TTL_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const SOURCE_OFFSET: usize = 12;
const DESTINATION_OFFSET: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in bytes (IHL * 4).
    pub header_len: usize,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let cur = ByteCursor::new(buf);
        let version_ihl = cur.read_u8(VERSION_IHL_OFFSET)?;

        let version = version_ihl >> VERSION_SHIFT;
        if version != 4 {
            return Err(DecodeError::BadVersion(version));
        }

        let header_len = (version_ihl & IHL_MASK) as usize * IHL_WORD_LEN;
        if header_len < IPV4_MIN_HEADER_LEN {
            return Err(DecodeError::BadHeaderLength(header_len));
        }
        if header_len > cur.remaining() {
            return Err(DecodeError::HeaderExceedsBuffer {
                declared: header_len,
                available: cur.remaining(),
            });
        }

        Ok(Self {
            version,
            header_len,
            ttl: cur.read_u8(TTL_OFFSET)?,
            protocol: cur.read_u8(PROTOCOL_OFFSET)?,
            source: Ipv4Addr::from(cur.read_array::<4>(SOURCE_OFFSET)?),
            destination: Ipv4Addr::from(cur.read_array::<4>(DESTINATION_OFFSET)?),
        })
    }

    pub fn classify(&self) -> Protocol {
        Protocol::from(self.protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version_ihl: u8, protocol: u8) -> [u8; 20] {
        [
            version_ihl, 0x00, 0x00, 0x28, // version/IHL, TOS, total length
            0x1c, 0x46, 0x40, 0x00, // id, flags/fragment
            0x40, protocol, 0x00, 0x00, // TTL=64, protocol, checksum
            10, 0, 0, 1, // src
            192, 168, 1, 100, // dst
        ]
    }

    #[test]
    fn test_decode_ipv4() {
        let ip = Ipv4Header::decode(&header(0x45, 6)).unwrap();
        assert_eq!(ip.version, 4);
        assert_eq!(ip.header_len, 20);
        assert_eq!(ip.ttl, 64);
        assert_eq!(ip.protocol, 6);
        assert_eq!(ip.classify(), Protocol::Tcp);
        assert_eq!(ip.source.to_string(), "10.0.0.1");
        assert_eq!(ip.destination.to_string(), "192.168.1.100");
    }

    #[test]
    fn test_rejects_wrong_version() {
        assert_eq!(
            Ipv4Header::decode(&header(0x65, 6)),
            Err(DecodeError::BadVersion(6))
        );
    }

    #[test]
    fn test_rejects_short_ihl() {
        assert_eq!(
            Ipv4Header::decode(&header(0x44, 6)),
            Err(DecodeError::BadHeaderLength(16))
        );
    }

    #[test]
    fn test_declared_length_beyond_buffer_fails() {
        // IHL = 6 words (24 bytes) but only 20 captured.
        assert_eq!(
            Ipv4Header::decode(&header(0x46, 6)),
            Err(DecodeError::HeaderExceedsBuffer {
                declared: 24,
                available: 20
            })
        );

        for ihl in 5u8..=15 {
            let declared = ihl as usize * 4;
            let mut buf = [0u8; 60];
            buf[..20].copy_from_slice(&header(0x40 | ihl, 17));
            for len in 1..declared {
                assert!(Ipv4Header::decode(&buf[..len]).is_err(), "ihl {} len {}", ihl, len);
            }
            assert!(Ipv4Header::decode(&buf[..declared]).is_ok());
        }
    }

    #[test]
    fn test_options_are_skipped() {
        let mut buf = [0u8; 24];
        buf[..20].copy_from_slice(&header(0x46, 1));
        let ip = Ipv4Header::decode(&buf).unwrap();
        assert_eq!(ip.header_len, 24);
        assert_eq!(ip.classify(), Protocol::Icmp);
    }

    #[test]
    fn test_empty_buffer() {
        assert!(matches!(
            Ipv4Header::decode(&[]),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
