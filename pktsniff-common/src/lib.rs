#![cfg_attr(not(test), no_std)]

//! Header decoders for raw captured frames.
//!
//! Everything here is a pure function over a borrowed byte slice: no
//! allocation, no I/O. All reads go through [`cursor::ByteCursor`] so a
//! short or malformed buffer turns into a [`DecodeError`] instead of an
//! out-of-bounds access.

pub mod cursor;
pub mod error;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod protocol;
pub mod record;
pub mod tcp;
pub mod udp;

pub use cursor::ByteCursor;
pub use error::DecodeError;
pub use ethernet::{EthernetHeader, MacAddr};
pub use icmp::IcmpHeader;
pub use ipv4::Ipv4Header;
pub use protocol::{ParseFilterError, Protocol, ProtocolFilter};
pub use record::{
    decode_frame, CaptureMode, DecodedRecord, Layer, LayerFailure, ParseModeError,
    TransportHeader,
};
pub use tcp::{TcpFlags, TcpHeader};
pub use udp::UdpHeader;
