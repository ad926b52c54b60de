//! Error types for the broadcasting protocol codec and dispatcher.

use core::fmt;

/// Errors produced while encoding, decoding or dispatching broadcasting frames.
///
/// Decode errors are always scoped to the frame being handled: the session
/// state built from earlier frames is never modified when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A write would run past the fixed frame capacity.
    #[error("frame buffer overrun: need {needed} bytes, {remaining} remaining")]
    BufferOverrun { needed: usize, remaining: usize },

    /// A string does not fit the 16-bit length prefix.
    #[error("string of {len} bytes exceeds the u16 length prefix")]
    StringTooLong { len: usize },

    /// A read would run past the end of the datagram.
    #[error("frame truncated: need {needed} bytes at offset {offset}, frame is {len} bytes")]
    Truncated {
        needed: usize,
        offset: usize,
        len: usize,
    },

    /// A length-prefixed string is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// ENTRY_LIST_CAR referenced a car that is not in the current entry list.
    #[error("unknown car index {0} in entry list car frame")]
    UnknownCarIndex(u16),

    /// The leading type byte is not part of the inbound catalog.
    #[error("unknown inbound message type {0}")]
    UnknownMessageType(u8),

    /// The caller asked for something the session cannot do in its current state.
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),
}

impl ProtocolError {
    /// Severity of this error for logging and supervision decisions.
    pub fn severity(&self) -> ErrorSeverity {
        if self.is_frame_local() {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }

    /// True when the error only affects the inbound frame that caused it.
    ///
    /// The frame is dropped and processing continues with the next datagram.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            ProtocolError::Truncated { .. }
                | ProtocolError::InvalidUtf8 { .. }
                | ProtocolError::UnknownCarIndex(_)
                | ProtocolError::UnknownMessageType(_)
        )
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// The offending frame was dropped; the session is unaffected.
    Warning = 1,
    /// A caller error; no bytes were produced.
    Error = 2,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// A specialized `Result` type for broadcasting protocol operations.
pub type Result<T> = core::result::Result<T, ProtocolError>;
