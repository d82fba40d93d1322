//! TCP header.
//!
//! Only the first 14 bytes are read: ports, sequence, acknowledgment and the
//! 16-bit data-offset/flags word.
//!
//! ```text
//!  12              13              14
//!  +-------+-------+-+-+-+-+-+-+-+-+
//!  | Data  |       |U|A|P|R|S|F|   |
//!  | Offset| Rsvd  |R|C|S|S|Y|I|   |
//!  |       |       |G|K|H|T|N|N|   |
//!  +-------+-------+-+-+-+-+-+-+---+
//! ```

use crate::{ByteCursor, DecodeError};
use core::fmt;

pub const TCP_MIN_HEADER_LEN: usize = 20;
pub const TCP_MAX_HEADER_LEN: usize = 60;
/// Bytes a decode needs to read every field we expose.
pub const TCP_FIELDS_LEN: usize = 14;

const SOURCE_PORT_OFFSET: usize = 0;
const DESTINATION_PORT_OFFSET: usize = 2;
const SEQUENCE_OFFSET: usize = 4;
const ACKNOWLEDGMENT_OFFSET: usize = 8;
const OFFSET_FLAGS_OFFSET: usize = 12;

const DATA_OFFSET_SHIFT: u16 = 12;
const DATA_OFFSET_WORD_LEN: usize = 4;

pub const FLAG_URG: u16 = 1 << 5;
pub const FLAG_ACK: u16 = 1 << 4;
pub const FLAG_PSH: u16 = 1 << 3;
pub const FLAG_RST: u16 = 1 << 2;
pub const FLAG_SYN: u16 = 1 << 1;
pub const FLAG_FIN: u16 = 1 << 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags {
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

impl TcpFlags {
    /// Extract each flag from the data-offset/flags word independently.
    pub fn from_bits(word: u16) -> Self {
        Self {
            urg: word & FLAG_URG != 0,
            ack: word & FLAG_ACK != 0,
            psh: word & FLAG_PSH != 0,
            rst: word & FLAG_RST != 0,
            syn: word & FLAG_SYN != 0,
            fin: word & FLAG_FIN != 0,
        }
    }

    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        for (set, mask) in [
            (self.urg, FLAG_URG),
            (self.ack, FLAG_ACK),
            (self.psh, FLAG_PSH),
            (self.rst, FLAG_RST),
            (self.syn, FLAG_SYN),
            (self.fin, FLAG_FIN),
        ] {
            if set {
                bits |= mask;
            }
        }
        bits
    }

    /// Set flag names in display order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.syn, "SYN"),
            (self.ack, "ACK"),
            (self.fin, "FIN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.urg, "URG"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    /// Header length in bytes (data offset * 4).
    pub data_offset: usize,
    pub flags: TcpFlags,
}

impl TcpHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let cur = ByteCursor::new(buf);
        cur.slice(0, TCP_FIELDS_LEN)?;

        let word = cur.read_u16_be(OFFSET_FLAGS_OFFSET)?;
        let data_offset = (word >> DATA_OFFSET_SHIFT) as usize * DATA_OFFSET_WORD_LEN;
        if data_offset < TCP_MIN_HEADER_LEN {
            return Err(DecodeError::BadHeaderLength(data_offset));
        }

        Ok(Self {
            source_port: cur.read_u16_be(SOURCE_PORT_OFFSET)?,
            destination_port: cur.read_u16_be(DESTINATION_PORT_OFFSET)?,
            sequence: cur.read_u32_be(SEQUENCE_OFFSET)?,
            acknowledgment: cur.read_u32_be(ACKNOWLEDGMENT_OFFSET)?,
            data_offset,
            flags: TcpFlags::from_bits(word),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(offset_flags: u16) -> [u8; 20] {
        let mut seg = [0u8; 20];
        seg[0..2].copy_from_slice(&12345u16.to_be_bytes());
        seg[2..4].copy_from_slice(&443u16.to_be_bytes());
        seg[4..8].copy_from_slice(&0xdead_beefu32.to_be_bytes());
        seg[8..12].copy_from_slice(&7u32.to_be_bytes());
        seg[12..14].copy_from_slice(&offset_flags.to_be_bytes());
        seg
    }

    #[test]
    fn test_decode_tcp() {
        let tcp = TcpHeader::decode(&segment(0x5000 | FLAG_SYN)).unwrap();
        assert_eq!(tcp.source_port, 12345);
        assert_eq!(tcp.destination_port, 443);
        assert_eq!(tcp.sequence, 0xdead_beef);
        assert_eq!(tcp.acknowledgment, 7);
        assert_eq!(tcp.data_offset, 20);
        assert_eq!(
            tcp.flags,
            TcpFlags {
                syn: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_all_flag_combinations() {
        for pattern in 0u16..64 {
            let tcp = TcpHeader::decode(&segment(0x5000 | pattern)).unwrap();
            assert_eq!(tcp.flags.bits(), pattern, "pattern {:06b}", pattern);
            assert_eq!(tcp.flags.urg, pattern & 0b100000 != 0);
            assert_eq!(tcp.flags.ack, pattern & 0b010000 != 0);
            assert_eq!(tcp.flags.psh, pattern & 0b001000 != 0);
            assert_eq!(tcp.flags.rst, pattern & 0b000100 != 0);
            assert_eq!(tcp.flags.syn, pattern & 0b000010 != 0);
            assert_eq!(tcp.flags.fin, pattern & 0b000001 != 0);
        }
    }

    #[test]
    fn test_reserved_bits_do_not_leak_into_flags() {
        // CWR/ECE and the reserved nibble are outside the six flags.
        let tcp = TcpHeader::decode(&segment(0x5fc0)).unwrap();
        assert_eq!(tcp.flags, TcpFlags::default());
    }

    #[test]
    fn test_flag_display_order() {
        let flags = TcpFlags::from_bits(0x3f);
        assert_eq!(flags.to_string(), "SYN,ACK,FIN,RST,PSH,URG");
        assert_eq!(TcpFlags::from_bits(FLAG_ACK | FLAG_PSH).to_string(), "ACK,PSH");
        assert_eq!(TcpFlags::default().to_string(), "");
    }

    #[test]
    fn test_data_offset() {
        let tcp = TcpHeader::decode(&segment(0xf000)).unwrap();
        assert_eq!(tcp.data_offset, TCP_MAX_HEADER_LEN);
        assert_eq!(
            TcpHeader::decode(&segment(0x4000)),
            Err(DecodeError::BadHeaderLength(16))
        );
    }

    #[test]
    fn test_fourteen_bytes_suffice() {
        let seg = segment(0x5000 | FLAG_FIN);
        assert!(TcpHeader::decode(&seg[..14]).is_ok());
        assert!(matches!(
            TcpHeader::decode(&seg[..13]),
            Err(DecodeError::Truncated { needed: 14, .. })
        ));
    }
}
