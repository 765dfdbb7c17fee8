//! # User Interface
//!
//! Colored terminal output with clickable file links.

pub mod log;

pub use log::{debug, error, event, file_written, header, info, path_link, print_logo, success, warn, Log};
