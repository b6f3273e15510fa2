pub mod compile;
pub mod evaluate;
pub mod jdwp;
pub mod jvm;
pub mod remote;
pub mod util;
