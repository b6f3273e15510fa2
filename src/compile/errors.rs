use crate::jvm;
use std::fmt;

/// Problem with the user's source, reported with javac's wording
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Qualified name of the source unit
    pub unit: String,

    /// 1-based line
    pub line: usize,

    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: error: {}", self.unit, self.line, self.message)
    }
}

#[derive(Debug)]
pub enum CompileError {
    /// The source does not compile
    Diagnostics(Vec<Diagnostic>),

    /// The source is fine but could not be turned into class files (eg. a method is too large)
    Tooling(String),
}

impl From<jvm::Error> for CompileError {
    fn from(err: jvm::Error) -> CompileError {
        CompileError::Tooling(err.to_string())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Diagnostics(diagnostics) => {
                let mut first = true;
                for diagnostic in diagnostics {
                    if !first {
                        writeln!(f)?;
                    }
                    first = false;
                    write!(f, "{}", diagnostic)?;
                }
                Ok(())
            }
            CompileError::Tooling(message) => write!(f, "compiler failure: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}
