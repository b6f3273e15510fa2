//! Client side of the Java Debug Wire Protocol
//!
//! Only the commands needed to evaluate code in a suspended thread are modelled: looking up
//! classes and methods, creating strings/arrays/objects, invoking methods, pinning objects, and
//! waiting for the event that suspends a thread.
//!
//! [0]: https://docs.oracle.com/en/java/javase/17/docs/specs/jdwp/jdwp-spec.html

mod commands;
mod connection;
mod data;
mod errors;
mod events;
mod packet;
mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::*;
pub use connection::*;
pub use data::*;
pub use errors::*;
pub use events::*;
pub use packet::*;
pub use runtime::*;
