use crate::compile::{CompileError, Diagnostic};
use crate::remote::RemoteError;
use std::fmt;

/// Why an evaluation did not produce a value
///
/// Every variant is terminal: nothing is retried and classes already defined in the target stay
/// defined.
#[derive(Debug)]
pub enum EvaluateError {
    /// The generated source does not compile
    Compilation(Vec<Diagnostic>),

    /// Compiled classes could not be transformed, or the call text is malformed
    CodeGeneration(String),

    /// The compiler itself failed on valid source
    Tooling(String),

    /// The target could not provide a class loader or define the classes
    Environment(RemoteError),

    /// A class that should be visible in the target is not
    ClassResolution(String),

    /// Executing the call failed for reasons other than the target code throwing
    RemoteInvocation(RemoteError),

    /// The thread is not suspended somewhere it can run code
    IllegalState(String),

    /// The evaluated code threw (carries the exception's message or class name)
    Evaluation(String),

    Cancelled,
}

impl EvaluateError {
    /// Whether the error is about the user's code (as opposed to the debugger or target)
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            EvaluateError::Compilation(_) | EvaluateError::Evaluation(_)
        )
    }

    /// Text to show the user (details of internal failures only go to the log)
    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            String::from("evaluation failed")
        }
    }
}

impl fmt::Display for EvaluateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluateError::Compilation(diagnostics) => {
                write!(f, "{}", CompileError::Diagnostics(diagnostics.clone()))
            }
            EvaluateError::CodeGeneration(message) => write!(f, "code generation failed: {}", message),
            EvaluateError::Tooling(message) => write!(f, "compiler failure: {}", message),
            EvaluateError::Environment(err) => write!(f, "cannot prepare the target: {}", err),
            EvaluateError::ClassResolution(name) => write!(f, "class not found: {}", name),
            EvaluateError::RemoteInvocation(err) => write!(f, "remote invocation failed: {}", err),
            EvaluateError::IllegalState(message) => write!(f, "thread cannot run code: {}", message),
            EvaluateError::Evaluation(description) => f.write_str(description),
            EvaluateError::Cancelled => f.write_str("evaluation cancelled"),
        }
    }
}

impl std::error::Error for EvaluateError {}

impl From<CompileError> for EvaluateError {
    fn from(err: CompileError) -> EvaluateError {
        match err {
            CompileError::Diagnostics(diagnostics) => EvaluateError::Compilation(diagnostics),
            CompileError::Tooling(message) => EvaluateError::Tooling(message),
        }
    }
}

impl EvaluateError {
    /// Classify a failure of the evaluated call itself
    pub fn from_call(err: RemoteError) -> EvaluateError {
        match err {
            RemoteError::Exception(exception) => EvaluateError::Evaluation(exception.description()),
            RemoteError::IllegalState(message) => EvaluateError::IllegalState(message),
            RemoteError::ClassNotFound(name) => EvaluateError::ClassResolution(name),
            RemoteError::Cancelled => EvaluateError::Cancelled,
            other => EvaluateError::RemoteInvocation(other),
        }
    }

    /// Classify a failure while preparing the loader or defining classes
    pub fn from_environment(err: RemoteError) -> EvaluateError {
        match err {
            RemoteError::Cancelled => EvaluateError::Cancelled,
            other => EvaluateError::Environment(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::remote::{ObjectKind, ObjectRef, TargetException};

    #[test]
    fn call_failures() {
        let thrown = RemoteError::Exception(TargetException {
            exception: ObjectRef::new(1, ObjectKind::Object),
            class_name: String::from("java.lang.RuntimeException"),
            message: Some(String::from("x")),
        });
        let err = EvaluateError::from_call(thrown);
        assert!(matches!(&err, EvaluateError::Evaluation(message) if message == "x"));
        assert!(err.is_user_facing());
        assert_eq!(err.user_message(), "x");

        let err = EvaluateError::from_call(RemoteError::Jdwp(112));
        assert!(matches!(err, EvaluateError::RemoteInvocation(RemoteError::Jdwp(112))));
        assert_eq!(err.user_message(), "evaluation failed");

        assert!(matches!(
            EvaluateError::from_call(RemoteError::IllegalState(String::from("THREAD_NOT_SUSPENDED"))),
            EvaluateError::IllegalState(_)
        ));
        assert!(matches!(
            EvaluateError::from_call(RemoteError::Cancelled),
            EvaluateError::Cancelled
        ));
        assert!(matches!(
            EvaluateError::from_environment(RemoteError::Cancelled),
            EvaluateError::Cancelled
        ));
        assert!(matches!(
            EvaluateError::from_environment(RemoteError::Jdwp(21)),
            EvaluateError::Environment(RemoteError::Jdwp(21))
        ));
    }

    #[test]
    fn compile_failures() {
        let err = EvaluateError::from(CompileError::Diagnostics(vec![Diagnostic {
            unit: String::from("a.Eval"),
            line: 3,
            message: String::from("cannot find symbol: variable unknownVar"),
        }]));
        assert_eq!(
            err.user_message(),
            "a.Eval:3: error: cannot find symbol: variable unknownVar"
        );
        assert!(!EvaluateError::from(CompileError::Tooling(String::from("code too large"))).is_user_facing());
    }
}
