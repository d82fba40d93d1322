//! UDP header (8 bytes).

use crate::{ByteCursor, DecodeError};

pub const UDP_HEADER_LEN: usize = 8;

const SOURCE_PORT_OFFSET: usize = 0;
const DESTINATION_PORT_OFFSET: usize = 2;
const LENGTH_OFFSET: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Declared datagram length, header included. Not checked against the
    /// captured bytes.
    pub length: u16,
}

impl UdpHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let cur = ByteCursor::new(buf);
        cur.slice(0, UDP_HEADER_LEN)?;

        Ok(Self {
            source_port: cur.read_u16_be(SOURCE_PORT_OFFSET)?,
            destination_port: cur.read_u16_be(DESTINATION_PORT_OFFSET)?,
            length: cur.read_u16_be(LENGTH_OFFSET)?,
        })
    }

    /// True when the datagram claims more bytes than `captured` (header
    /// included) holds, i.e. the capture cut it short.
    pub fn is_truncated(&self, captured: usize) -> bool {
        self.length as usize > captured
    }
}
