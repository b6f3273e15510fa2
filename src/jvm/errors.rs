use super::class_file::ConstantPoolOverflow;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConstantPoolOverflow(ConstantPoolOverflow),
    MethodCodeOverflow {
        instruction: String,
        offset: usize,
    },
    IoError(std::io::Error),

    /// Bytes that are not a well-formed class file
    Malformed {
        offset: usize,
        message: String,
    },

    /// An instruction needs more operands than are on the stack (indicates a bug)
    StackUnderflow {
        instruction: String,
        offset: usize,
    },

    /// An instruction was pushed after a `return` or `athrow`
    ///
    /// There are no branches, so such code could never run and the verifier would reject it.
    UnreachableCode {
        instruction: String,
        offset: usize,
    },

    /// The stack or the locals grew past `u16::MAX` slots
    FrameOverflow,

    BadDescriptor(String),
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(overflow)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow(overflow) => write!(
                f,
                "constant pool overflow at #{} adding {:?}",
                overflow.offset, overflow.constant
            ),
            Error::MethodCodeOverflow {
                instruction,
                offset,
            } => write!(f, "method code overflow at {} ({})", offset, instruction),
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Malformed { offset, message } => {
                write!(f, "malformed class file at byte {}: {}", offset, message)
            }
            Error::StackUnderflow {
                instruction,
                offset,
            } => write!(f, "stack underflow at {} ({})", offset, instruction),
            Error::UnreachableCode {
                instruction,
                offset,
            } => write!(f, "unreachable code at {} ({})", offset, instruction),
            Error::FrameOverflow => write!(f, "too many stack or local slots"),
            Error::BadDescriptor(desc) => write!(f, "bad descriptor: {}", desc),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}
