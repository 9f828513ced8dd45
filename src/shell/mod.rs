mod app_channel;
mod args;
mod console;

pub use app_channel::*;
pub use args::*;
pub use console::*;
