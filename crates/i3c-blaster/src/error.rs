//! Error types for i3c-blaster

use core::fmt;

use crate::channel::ChannelError;
use crate::status;

/// Error type for adapter operations
///
/// A missing device or a port that cannot be opened is not an error by itself:
/// the command then goes unanswered and surfaces as a [`BlasterError::Protocol`]
/// carrying an empty status tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlasterError {
    /// A reply value is not an integer literal, does not fit the result type,
    /// or a required value is missing
    Format(String),
    /// The adapter answered with a status other than `OK(0)` or an anticipated
    /// alternate; carries the tag verbatim
    Protocol(String),
    /// Argument rejected before anything was sent
    InvalidArgument(String),
    /// I/O failure on an open channel
    Channel(ChannelError),
}

impl BlasterError {
    /// Status tag of a protocol error
    pub fn status(&self) -> Option<&str> {
        match self {
            BlasterError::Protocol(tag) => Some(tag),
            _ => None,
        }
    }

    /// The transfer was pre-empted by an in-band interrupt or hot-join request
    pub fn is_ibi_pending(&self) -> bool {
        self.status() == Some(status::IBI_ARBITRATION)
    }
}

impl fmt::Display for BlasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlasterError::Format(msg) => write!(f, "Malformed reply: {msg}"),
            BlasterError::Protocol(tag) if tag.is_empty() => {
                write!(f, "I3C Blaster exception: no reply (device not connected?)")
            }
            BlasterError::Protocol(tag) => write!(f, "I3C Blaster exception: {tag}"),
            BlasterError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            BlasterError::Channel(err) => write!(f, "Channel error: {err}"),
        }
    }
}

impl std::error::Error for BlasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlasterError::Channel(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ChannelError> for BlasterError {
    fn from(err: ChannelError) -> Self {
        BlasterError::Channel(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = BlasterError::Protocol("ERR_NAKED(3)".to_string());
        assert_eq!(err.to_string(), "I3C Blaster exception: ERR_NAKED(3)");

        let err = BlasterError::Protocol(String::new());
        assert!(err.to_string().contains("no reply"));
    }

    #[test]
    fn test_is_ibi_pending() {
        assert!(BlasterError::Protocol(status::IBI_ARBITRATION.to_string()).is_ibi_pending());
        assert!(!BlasterError::Protocol(status::NAKED.to_string()).is_ibi_pending());
        assert!(!BlasterError::Format("x".to_string()).is_ibi_pending());
    }
}
