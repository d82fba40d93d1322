//! Raw capture socket: AF_PACKET on Linux.

use chrono::Utc;
use socket2::{SockAddr, Socket};
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;

use pktsniff_common::CaptureMode;

use crate::capture::{FrameOrigin, FrameSource, RawFrame};
use crate::error::CaptureError;

const ETH_P_ALL: u16 = 0x0003;
const ETH_P_IP: u16 = 0x0800;

/// A bound raw socket plus the receive buffer every read reuses.
///
/// The socket is closed when this is dropped.
pub struct RawSocket {
    socket: Socket,
    buffer: Vec<MaybeUninit<u8>>,
    interface: String,
}

impl RawSocket {
    /// Open a packet socket for `mode`.
    ///
    /// `LinkLayer` gets full Ethernet frames (`SOCK_RAW`, all EtherTypes).
    /// `IpLayer` gets IPv4 datagrams with the link header already stripped
    /// (`SOCK_DGRAM`, EtherType 0x0800). With no interface the socket sees
    /// every interface.
    #[cfg(target_os = "linux")]
    pub fn open(
        interface: Option<&str>,
        mode: CaptureMode,
        read_timeout: Duration,
        buffer_size: usize,
    ) -> Result<Self, CaptureError> {
        use socket2::{Domain, Protocol, Type};

        let (ty, ether_type) = match mode {
            CaptureMode::LinkLayer => (Type::RAW, ETH_P_ALL),
            CaptureMode::IpLayer => (Type::DGRAM, ETH_P_IP),
        };

        let socket = Socket::new(
            Domain::PACKET,
            ty,
            Some(Protocol::from(i32::from(ether_type.to_be()))),
        )
        .map_err(CaptureError::from_open)?;

        if let Some(name) = interface {
            let ifindex = if_nametoindex(name)?;
            bind_to_interface(&socket, ifindex, ether_type)?;
        }

        // Bounded reads let the capture loop notice cancellation.
        socket
            .set_read_timeout(Some(read_timeout))
            .map_err(CaptureError::Socket)?;

        let interface = interface.unwrap_or("any").to_string();
        tracing::info!(
            "AF_PACKET capture on {} (mode={}, buffer={})",
            interface,
            mode,
            buffer_size
        );

        Ok(Self {
            socket,
            buffer: vec![MaybeUninit::uninit(); buffer_size],
            interface,
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open(
        _interface: Option<&str>,
        _mode: CaptureMode,
        _read_timeout: Duration,
        _buffer_size: usize,
    ) -> Result<Self, CaptureError> {
        Err(CaptureError::Unsupported(
            "AF_PACKET sockets are only available on Linux",
        ))
    }
}

impl FrameSource for RawSocket {
    fn read_frame(&mut self) -> Result<Option<RawFrame<'_>>, CaptureError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((n, addr)) => {
                let n = n.min(self.buffer.len());
                // SAFETY: recv_from initialised the first `n` bytes.
                let data =
                    unsafe { std::slice::from_raw_parts(self.buffer.as_ptr() as *const u8, n) };
                Ok(Some(RawFrame {
                    data,
                    captured_at: Utc::now(),
                    origin: frame_origin(&addr),
                }))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(CaptureError::Read(e)),
        }
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        tracing::debug!("Capture socket on {} released", self.interface);
    }
}

#[cfg(target_os = "linux")]
fn if_nametoindex(name: &str) -> Result<i32, CaptureError> {
    let c_name = std::ffi::CString::new(name)
        .map_err(|_| CaptureError::InterfaceNotFound(name.to_string()))?;
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(CaptureError::InterfaceNotFound(name.to_string()));
    }
    Ok(index as i32)
}

#[cfg(target_os = "linux")]
fn bind_to_interface(socket: &Socket, ifindex: i32, ether_type: u16) -> Result<(), CaptureError> {
    use std::os::fd::AsRawFd;

    let mut sll: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    sll.sll_family = libc::AF_PACKET as u16;
    sll.sll_protocol = ether_type.to_be();
    sll.sll_ifindex = ifindex;

    let ret = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(CaptureError::from_open(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn frame_origin(addr: &SockAddr) -> Option<FrameOrigin> {
    if addr.family() != libc::AF_PACKET as libc::sa_family_t {
        return None;
    }
    // SAFETY: the family says the storage holds a sockaddr_ll, which fits in
    // sockaddr_storage.
    let sll = unsafe { &*(addr.as_ptr() as *const libc::sockaddr_ll) };
    Some(FrameOrigin {
        ifindex: sll.sll_ifindex,
        packet_type: sll.sll_pkttype,
    })
}

#[cfg(not(target_os = "linux"))]
fn frame_origin(_addr: &SockAddr) -> Option<FrameOrigin> {
    None
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface_is_reported() {
        assert!(matches!(
            if_nametoindex("no-such-if0"),
            Err(CaptureError::InterfaceNotFound(name)) if name == "no-such-if0"
        ));
    }
}
