//! # Triad Library
//!
//! Hosts chat, text-to-image and speech-to-text models in one process.
//! Each subsystem keeps at most one model resident, loads it on first use
//! and unloads it again after an idle period.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod ui;
