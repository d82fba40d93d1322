//! ICMP header: type, code and checksum only.

use crate::{ByteCursor, DecodeError};

pub const ICMP_HEADER_LEN: usize = 4;

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

impl IcmpHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let cur = ByteCursor::new(buf);
        cur.slice(0, ICMP_HEADER_LEN)?;

        Ok(Self {
            icmp_type: cur.read_u8(TYPE_OFFSET)?,
            code: cur.read_u8(CODE_OFFSET)?,
            checksum: cur.read_u16_be(CHECKSUM_OFFSET)?,
        })
    }
}
