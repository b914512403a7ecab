#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod codec;
mod compact;
mod envelope;
mod error;
mod transport;

pub use codec::*;
pub use compact::*;
pub use envelope::*;
pub use error::*;
pub use transport::*;
