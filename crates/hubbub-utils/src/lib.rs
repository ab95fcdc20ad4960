mod assert;
mod bytevec;

pub use bytevec::{ByteVec, Overflow};
