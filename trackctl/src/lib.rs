//! Library part of `trackctl`, the commands themselves live here so they can be tested.
//!

pub use cli::*;
pub use cmds::*;

mod cli;
mod cmds;
