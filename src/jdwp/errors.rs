use super::Command;
use crate::remote::RemoteError;
use std::fmt;

/// Error codes found in JDWP replies
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/specs/jdwp/jdwp-protocol.html#JDWP_Error
pub mod error_code {
    pub const INVALID_THREAD: u16 = 10;
    pub const THREAD_NOT_SUSPENDED: u16 = 13;
    pub const INVALID_OBJECT: u16 = 20;
    pub const INVALID_CLASS: u16 = 21;
    pub const CLASS_NOT_PREPARED: u16 = 22;
    pub const INVALID_METHODID: u16 = 23;
    pub const TYPE_MISMATCH: u16 = 34;
    pub const NOT_IMPLEMENTED: u16 = 99;
    pub const ABSENT_INFORMATION: u16 = 101;
    pub const INVALID_EVENT_TYPE: u16 = 102;
    pub const ILLEGAL_ARGUMENT: u16 = 103;
    pub const VM_DEAD: u16 = 112;
    pub const ALREADY_INVOKING: u16 = 502;
    pub const INVALID_LENGTH: u16 = 504;

    /// Constant name of a known error code
    pub fn name(code: u16) -> Option<&'static str> {
        Some(match code {
            INVALID_THREAD => "INVALID_THREAD",
            THREAD_NOT_SUSPENDED => "THREAD_NOT_SUSPENDED",
            INVALID_OBJECT => "INVALID_OBJECT",
            INVALID_CLASS => "INVALID_CLASS",
            CLASS_NOT_PREPARED => "CLASS_NOT_PREPARED",
            INVALID_METHODID => "INVALID_METHODID",
            TYPE_MISMATCH => "TYPE_MISMATCH",
            NOT_IMPLEMENTED => "NOT_IMPLEMENTED",
            ABSENT_INFORMATION => "ABSENT_INFORMATION",
            INVALID_EVENT_TYPE => "INVALID_EVENT_TYPE",
            ILLEGAL_ARGUMENT => "ILLEGAL_ARGUMENT",
            VM_DEAD => "VM_DEAD",
            ALREADY_INVOKING => "ALREADY_INVOKING",
            INVALID_LENGTH => "INVALID_LENGTH",
            _ => return None,
        })
    }
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),

    /// The other side did not answer the handshake with `JDWP-Handshake`
    Handshake(Vec<u8>),

    /// The target replied to a command with an error code
    Reply { command: Command, code: u16 },

    /// Packet or reply data that can't be decoded
    Malformed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{}", err),
            Error::Handshake(received) => write!(
                f,
                "bad handshake: {:?}",
                String::from_utf8_lossy(received)
            ),
            Error::Reply { command, code } => match error_code::name(*code) {
                Some(name) => write!(f, "{} failed: {} ({})", command, name, code),
                None => write!(f, "{} failed with error {}", command, code),
            },
            Error::Malformed(message) => write!(f, "malformed packet: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Error> for RemoteError {
    fn from(err: Error) -> RemoteError {
        use error_code::*;

        match err {
            Error::Io(err) => RemoteError::Transport(err),
            Error::Reply { code, .. } => {
                let name = error_code::name(code).unwrap_or("unknown error").to_owned();
                match code {
                    THREAD_NOT_SUSPENDED | INVALID_THREAD | ALREADY_INVOKING => {
                        RemoteError::IllegalState(name)
                    }
                    TYPE_MISMATCH | ILLEGAL_ARGUMENT => RemoteError::Type(name),
                    _ => RemoteError::Jdwp(code),
                }
            }
            Error::Handshake(_) | Error::Malformed(_) => RemoteError::Protocol(err.to_string()),
        }
    }
}
