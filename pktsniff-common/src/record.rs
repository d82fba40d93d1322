//! Composition of the header decoders over one captured frame.

use crate::ethernet::ETHERNET_HEADER_LEN;
use crate::icmp::ICMP_HEADER_LEN;
use crate::udp::UDP_HEADER_LEN;
use crate::{
    ByteCursor, DecodeError, EthernetHeader, IcmpHeader, Ipv4Header, Protocol, TcpHeader,
    UdpHeader,
};
use core::fmt;
use core::str::FromStr;

/// What a capture socket hands back per read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureMode {
    /// Frames start with an Ethernet header.
    #[default]
    LinkLayer,
    /// Frames start with the IPv4 header; there is no link header.
    IpLayer,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::LinkLayer => write!(f, "link"),
            CaptureMode::IpLayer => write!(f, "ip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError;

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture mode must be `link` or `ip`")
    }
}

impl core::error::Error for ParseModeError {}

impl FromStr for CaptureMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("link") {
            Ok(CaptureMode::LinkLayer)
        } else if s.eq_ignore_ascii_case("ip") {
            Ok(CaptureMode::IpLayer)
        } else {
            Err(ParseModeError)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Tcp,
    Udp,
    Icmp,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Ethernet => "Ethernet",
            Layer::Ipv4 => "IPv4",
            Layer::Tcp => "TCP",
            Layer::Udp => "UDP",
            Layer::Icmp => "ICMP",
        };
        f.write_str(name)
    }
}

/// The layer at which decoding of a frame gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerFailure {
    pub layer: Layer,
    pub error: DecodeError,
}

impl fmt::Display for LayerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.layer, self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportHeader {
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmp(IcmpHeader),
}

/// Every header that decoded for one frame, plus whatever follows the
/// deepest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    pub ethernet: Option<EthernetHeader>,
    pub ipv4: Option<Ipv4Header>,
    pub protocol: Option<Protocol>,
    pub transport: Option<TransportHeader>,
    /// Bytes after the last header that decoded. The whole frame if none did.
    pub payload: &'a [u8],
    pub failure: Option<LayerFailure>,
}

impl<'a> DecodedRecord<'a> {
    fn empty(frame: &'a [u8]) -> Self {
        Self {
            ethernet: None,
            ipv4: None,
            protocol: None,
            transport: None,
            payload: frame,
            failure: None,
        }
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        match &self.transport {
            Some(TransportHeader::Tcp(h)) => Some(h),
            _ => None,
        }
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        match &self.transport {
            Some(TransportHeader::Udp(h)) => Some(h),
            _ => None,
        }
    }

    pub fn icmp(&self) -> Option<&IcmpHeader> {
        match &self.transport {
            Some(TransportHeader::Icmp(h)) => Some(h),
            _ => None,
        }
    }

    fn fail(mut self, layer: Layer, error: DecodeError) -> Self {
        self.failure = Some(LayerFailure { layer, error });
        self
    }
}

/// Decode one frame as far as it goes.
///
/// Never fails: a layer that does not decode ends the walk and is recorded in
/// [`DecodedRecord::failure`], keeping every header decoded before it.
pub fn decode_frame(frame: &[u8], mode: CaptureMode) -> DecodedRecord<'_> {
    let mut record = DecodedRecord::empty(frame);

    let ip_start = match mode {
        CaptureMode::IpLayer => 0,
        CaptureMode::LinkLayer => {
            let eth = match EthernetHeader::decode(frame) {
                Ok(eth) => eth,
                Err(e) => return record.fail(Layer::Ethernet, e),
            };
            record.ethernet = Some(eth);
            record.payload = ByteCursor::new(frame)
                .rest(ETHERNET_HEADER_LEN)
                .unwrap_or_default();
            if !eth.is_ipv4() {
                return record;
            }
            ETHERNET_HEADER_LEN
        }
    };

    let packet = ByteCursor::at(frame, ip_start).rest(0).unwrap_or_default();
    let ip = match Ipv4Header::decode(packet) {
        Ok(ip) => ip,
        Err(e) => return record.fail(Layer::Ipv4, e),
    };
    let protocol = ip.classify();
    record.ipv4 = Some(ip);
    record.protocol = Some(protocol);

    let segment = ByteCursor::new(packet).rest(ip.header_len).unwrap_or_default();
    record.payload = segment;

    let decoded = match protocol {
        Protocol::Tcp => TcpHeader::decode(segment)
            .map(|h| (TransportHeader::Tcp(h), h.data_offset))
            .map_err(|e| (Layer::Tcp, e)),
        Protocol::Udp => UdpHeader::decode(segment)
            .map(|h| (TransportHeader::Udp(h), UDP_HEADER_LEN))
            .map_err(|e| (Layer::Udp, e)),
        Protocol::Icmp => IcmpHeader::decode(segment)
            .map(|h| (TransportHeader::Icmp(h), ICMP_HEADER_LEN))
            .map_err(|e| (Layer::Icmp, e)),
        Protocol::Other(_) => return record,
    };

    match decoded {
        Ok((header, header_len)) => {
            record.transport = Some(header);
            // A data offset past the captured bytes leaves no payload.
            record.payload = ByteCursor::new(segment)
                .rest(header_len)
                .unwrap_or_default();
            record
        }
        Err((layer, e)) => record.fail(layer, e),
    }
}
