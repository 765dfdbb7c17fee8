//! # Runtime
//!
//! Everything that leaves the process: pipeline workers, GPU probing and
//! FFmpeg audio conversion.

pub mod audio;
pub mod gpu;
pub mod pipeline;
pub mod worker;

pub use pipeline::{invoke, PipelineHandle};
pub use worker::{Worker, WorkerCommand, WorkerHandle, WorkerLoader, WorkerSettings};

/// The three model families, one slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
	Chat,
	Image,
	Speech,
}

impl Subsystem {
	pub const ALL: [Subsystem; 3] = [Subsystem::Chat, Subsystem::Image, Subsystem::Speech];

	pub fn label(&self) -> &'static str {
		match self {
			Subsystem::Chat => "chat",
			Subsystem::Image => "image",
			Subsystem::Speech => "speech",
		}
	}

	pub fn parse(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|s| s.label().eq_ignore_ascii_case(name.trim()))
	}
}
