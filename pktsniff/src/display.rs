use std::io::{self, Write};

use crate::record::PacketRecord;

const RULE_WIDTH: usize = 80;

/// Render one record as a block of text, outermost layer first.
pub fn write_packet<W: Write>(out: &mut W, rec: &PacketRecord) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out)?;
    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "Packet #{} - {} ({} bytes){}",
        rec.index,
        rec.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        rec.length,
        if rec.outgoing == Some(true) { " [out]" } else { "" }
    )?;
    writeln!(out, "{}", rule)?;

    if let Some(eth) = &rec.ethernet {
        writeln!(out, "[Ethernet]")?;
        writeln!(out, "  Source MAC:      {}", eth.src_mac)?;
        writeln!(out, "  Destination MAC: {}", eth.dst_mac)?;
        writeln!(out, "  EtherType:       0x{:04x}", eth.ether_type)?;
    }

    if let Some(ip) = &rec.ipv4 {
        writeln!(
            out,
            "[IPv4 - {}]",
            rec.protocol.as_deref().unwrap_or("?")
        )?;
        writeln!(out, "  Source:      {}", ip.src_ip)?;
        writeln!(out, "  Destination: {}", ip.dst_ip)?;
        writeln!(out, "  TTL:         {}", ip.ttl)?;
    }

    if let Some(tcp) = &rec.tcp {
        writeln!(out, "[TCP]")?;
        writeln!(out, "  Source Port:      {}", tcp.src_port)?;
        writeln!(out, "  Destination Port: {}", tcp.dst_port)?;
        writeln!(out, "  Flags:            {}", tcp.flags)?;
        writeln!(out, "  Sequence:         {}", tcp.sequence)?;
        writeln!(out, "  Acknowledgment:   {}", tcp.acknowledgment)?;
    }

    if let Some(udp) = &rec.udp {
        writeln!(out, "[UDP]")?;
        writeln!(out, "  Source Port:      {}", udp.src_port)?;
        writeln!(out, "  Destination Port: {}", udp.dst_port)?;
        if udp.truncated {
            writeln!(out, "  Length:           {} (truncated capture)", udp.length)?;
        } else {
            writeln!(out, "  Length:           {}", udp.length)?;
        }
    }

    if let Some(icmp) = &rec.icmp {
        writeln!(out, "[ICMP]")?;
        writeln!(out, "  Type:     {}", icmp.icmp_type)?;
        writeln!(out, "  Code:     {}", icmp.code)?;
        writeln!(out, "  Checksum: {}", icmp.checksum)?;
    }

    if let Some(err) = &rec.decode_error {
        writeln!(out, "[Incomplete] {}", err)?;
    }

    if !rec.payload_preview.is_empty() {
        writeln!(out, "[Data ({} bytes)]", rec.payload_length)?;
        writeln!(out, "  {}", rec.payload_preview)?;
    }

    Ok(())
}
