//! # Command Implementations
//!
//! Each submodule handles one CLI command.

pub mod chat;
pub mod chats;
pub mod image;
pub mod models;
pub mod session;
pub mod transcribe;
