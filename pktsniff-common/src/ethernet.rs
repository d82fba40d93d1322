//! Ethernet II header.
//!
//! ```text
//!  0                   6                  12      14
//!  +-------------------+-------------------+-------+
//!  |  destination MAC  |    source MAC     | type  |
//!  +-------------------+-------------------+-------+
//! ```

use crate::{ByteCursor, DecodeError};
use core::fmt;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERTYPE_IPV4: u16 = 0x0800;

const DESTINATION_OFFSET: usize = 0;
const SOURCE_OFFSET: usize = 6;
const ETHERTYPE_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    /// Host byte order.
    pub ether_type: u16,
}

impl EthernetHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let cur = ByteCursor::new(buf);
        // Check the full header up front so the error reports 14, not the
        // width of whichever field happened to run off the end.
        cur.slice(0, ETHERNET_HEADER_LEN)?;

        Ok(Self {
            destination: MacAddr(cur.read_array(DESTINATION_OFFSET)?),
            source: MacAddr(cur.read_array(SOURCE_OFFSET)?),
            ether_type: cur.read_u16_be(ETHERTYPE_OFFSET)?,
        })
    }

    pub fn is_ipv4(&self) -> bool {
        self.ether_type == ETHERTYPE_IPV4
    }
}
