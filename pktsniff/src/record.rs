use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use pktsniff_common::udp::UDP_HEADER_LEN;
use pktsniff_common::{DecodedRecord, TransportHeader};

use crate::capture::RawFrame;

/// Bytes of payload kept on each record.
pub const PAYLOAD_PREVIEW_LEN: usize = 64;

/// `sll_pkttype` for frames this host sent.
const PACKET_OUTGOING: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EthernetInfo {
    pub src_mac: String,
    pub dst_mac: String,
    pub ether_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv4Info {
    pub version: u8,
    pub header_length: usize,
    pub ttl: u8,
    pub protocol: u8,
    pub src_ip: String,
    pub dst_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpInfo {
    pub src_port: u16,
    pub dst_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    pub data_offset: usize,
    pub flags: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UdpInfo {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    /// Declared length exceeds what was captured.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IcmpInfo {
    #[serde(rename = "type")]
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

/// Owned, serialisable snapshot of one decoded frame, handed to the output
/// task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketRecord {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifindex: Option<i32>,
    /// Sent by this host rather than received. Unknown without an origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Info>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp: Option<TcpInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp: Option<UdpInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp: Option<IcmpInfo>,
    pub payload_length: usize,
    /// First [`PAYLOAD_PREVIEW_LEN`] payload bytes, hex, space separated.
    pub payload_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

impl PacketRecord {
    pub fn from_decoded(index: u64, frame: &RawFrame<'_>, record: &DecodedRecord<'_>) -> Self {
        let ethernet = record.ethernet.map(|eth| EthernetInfo {
            src_mac: eth.source.to_string(),
            dst_mac: eth.destination.to_string(),
            ether_type: eth.ether_type,
        });

        let ipv4 = record.ipv4.map(|ip| Ipv4Info {
            version: ip.version,
            header_length: ip.header_len,
            ttl: ip.ttl,
            protocol: ip.protocol,
            src_ip: ip.source.to_string(),
            dst_ip: ip.destination.to_string(),
        });

        let (mut tcp, mut udp, mut icmp) = (None, None, None);
        match record.transport {
            Some(TransportHeader::Tcp(h)) => {
                tcp = Some(TcpInfo {
                    src_port: h.source_port,
                    dst_port: h.destination_port,
                    sequence: h.sequence,
                    acknowledgment: h.acknowledgment,
                    data_offset: h.data_offset,
                    flags: h.flags.to_string(),
                })
            }
            Some(TransportHeader::Udp(h)) => {
                udp = Some(UdpInfo {
                    src_port: h.source_port,
                    dst_port: h.destination_port,
                    length: h.length,
                    truncated: h.is_truncated(UDP_HEADER_LEN + record.payload.len()),
                })
            }
            Some(TransportHeader::Icmp(h)) => {
                icmp = Some(IcmpInfo {
                    icmp_type: h.icmp_type,
                    code: h.code,
                    checksum: h.checksum,
                })
            }
            None => {}
        }

        Self {
            index,
            timestamp: frame.captured_at,
            length: frame.data.len(),
            ifindex: frame.origin.map(|o| o.ifindex),
            outgoing: frame.origin.map(|o| o.packet_type == PACKET_OUTGOING),
            ethernet,
            ipv4,
            protocol: record.protocol.map(|p| p.to_string()),
            tcp,
            udp,
            icmp,
            payload_length: record.payload.len(),
            payload_preview: hex_preview(record.payload, PAYLOAD_PREVIEW_LEN),
            decode_error: record.failure.map(|f| f.to_string()),
        }
    }
}

fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let shown = &bytes[..bytes.len().min(limit)];
    let mut out = String::with_capacity(shown.len() * 3);
    for (i, b) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}
