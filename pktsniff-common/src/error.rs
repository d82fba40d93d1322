use core::fmt;

/// Why a header decoder rejected its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before the bytes a read needs.
    Truncated { needed: usize, available: usize },
    /// IPv4 version nibble was not 4.
    BadVersion(u8),
    /// A declared header length (in bytes) below the protocol minimum.
    BadHeaderLength(usize),
    /// A declared header length larger than the bytes actually captured.
    HeaderExceedsBuffer { declared: usize, available: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => {
                write!(f, "truncated: need {} bytes, got {}", needed, available)
            }
            DecodeError::BadVersion(v) => write!(f, "unexpected IP version {}", v),
            DecodeError::BadHeaderLength(len) => {
                write!(f, "invalid header length {} bytes", len)
            }
            DecodeError::HeaderExceedsBuffer {
                declared,
                available,
            } => write!(
                f,
                "header declares {} bytes but only {} captured",
                declared, available
            ),
        }
    }
}

impl core::error::Error for DecodeError {}
