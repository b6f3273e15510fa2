//! Reading and writing of the [`class` file format][0]
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html

mod attribute;
mod class;
mod constants;
mod reader;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use reader::*;
pub use serialize::*;
pub use version::*;
