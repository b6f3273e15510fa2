use super::ObjectRef;
use std::fmt;

/// Exception thrown in the target process by a remote call
#[derive(Clone, Debug, PartialEq)]
pub struct TargetException {
    pub exception: ObjectRef,

    /// Java name of the exception's class (`java.lang.RuntimeException`)
    pub class_name: String,

    /// Result of `getMessage()`, if it could be obtained and was not `null`
    pub message: Option<String>,
}

impl TargetException {
    /// Description shown to the user: the message, or the class name when there is no message
    pub fn description(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.class_name.clone(),
        }
    }
}

impl fmt::Display for TargetException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

/// Failure of an operation on the target process
#[derive(Debug)]
pub enum RemoteError {
    /// Class is not visible from the requested class loader
    ClassNotFound(String),

    /// Arguments don't match the method or array being used
    Type(String),

    /// Thread is not suspended somewhere it can run code
    IllegalState(String),

    /// The target code threw
    Exception(TargetException),

    /// The connection to the target failed (includes timeouts)
    Transport(std::io::Error),

    /// Wire protocol error code not covered by the other variants
    Jdwp(u16),

    /// Reply from the target that does not make sense
    Protocol(String),

    /// The suspend context was cancelled, so nothing more was sent to the target
    Cancelled,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::ClassNotFound(name) => write!(f, "class not found: {}", name),
            RemoteError::Type(message) => write!(f, "type mismatch: {}", message),
            RemoteError::IllegalState(message) => write!(f, "illegal thread state: {}", message),
            RemoteError::Exception(exception) => write!(f, "exception in target: {}", exception),
            RemoteError::Transport(err) => write!(f, "transport failure: {}", err),
            RemoteError::Jdwp(code) => write!(f, "JDWP error {}", code),
            RemoteError::Protocol(message) => write!(f, "protocol error: {}", message),
            RemoteError::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> RemoteError {
        RemoteError::Transport(err)
    }
}
