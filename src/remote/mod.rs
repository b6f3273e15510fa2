//! The target process, as seen by the evaluator
//!
//! [`RemoteRuntime`] is the capability the evaluator needs from a debugger connection: look up
//! classes, create objects and arrays, invoke methods, and pin objects so they survive until the
//! evaluation result has been used. The JDWP implementation lives in [`crate::jdwp`].

mod context;
mod errors;
mod runtime;
mod value;

pub use context::*;
pub use errors::*;
pub use runtime::*;
pub use value::*;
