//! Utility types and functions

pub mod colors;
pub mod config;
pub mod console;
pub mod logger;
pub mod width;

pub use colors::Palette;
pub use console::{Capture, Console};
pub use width::display_width;
