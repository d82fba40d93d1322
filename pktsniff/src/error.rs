#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("raw socket access denied (run as root or grant CAP_NET_RAW): {0}")]
    PermissionDenied(#[source] std::io::Error),
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),
    #[error("raw capture is not supported on this platform: {0}")]
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    Unsupported(&'static str),
    #[error("cannot open capture socket: {0}")]
    Socket(#[source] std::io::Error),
    #[error("capture read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("record sink closed")]
    SinkClosed,
    #[error("output error: {0}")]
    Output(#[source] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl CaptureError {
    /// Classify an error from socket creation or bind.
    pub fn from_open(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(err),
            _ => CaptureError::Socket(err),
        }
    }
}
