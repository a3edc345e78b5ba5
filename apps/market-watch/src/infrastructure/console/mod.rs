//! Console Front End
//!
//! A terminal stand-in for the table UI: a renderer that redraws the latest
//! view frame and a line reader that turns typed commands into board
//! actions.

mod commands;
mod render;

pub use commands::{CommandReader, ConsoleCommand, HELP, parse_command};
pub use render::{ConsoleRenderer, render_table};
