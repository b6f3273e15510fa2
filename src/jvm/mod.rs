//! JVM class files: names, descriptors, the binary format, straight-line bytecode, and in-place
//! rewriting of compiled classes.

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod transform;

pub use access_flags::*;
pub use class_file::Version;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
