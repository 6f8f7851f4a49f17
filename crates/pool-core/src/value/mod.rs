//! RT/RD Value Allocator
//!
//! Hands out single integers from a contiguous range, formatted as
//! `admin:number` in one of the three L3VPN encodings.

pub mod format;
pub mod pool;

pub use format::*;
pub use pool::*;
