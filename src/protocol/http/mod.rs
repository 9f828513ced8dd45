mod client;
mod config;
mod error;
mod pipeline;
mod refresh;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use transport::*;
