#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod buffer;
mod config;
mod error;
mod handler;
mod metrics;
mod pool;
mod queue;
mod server;
mod transport;
mod worker;

pub use buffer::*;
pub use config::*;
pub use error::*;
pub use handler::*;
pub use metrics::*;
pub use pool::*;
pub use server::*;

// Public re-export so downstream crates can access `gust_codec` via
// `gust::gust_codec`
pub use gust_codec;
