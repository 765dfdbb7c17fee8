//! GPU detection through `nvidia-smi`

use std::process::{Command, Stdio};
use std::sync::OnceLock;

const MIB: u64 = 1024 * 1024;

static TOTAL_MEMORY: OnceLock<Option<u64>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
	Cuda,
	Cpu,
}

impl Device {
	pub fn as_str(&self) -> &'static str {
		match self {
			Device::Cuda => "cuda",
			Device::Cpu => "cpu",
		}
	}

	/// Precision the workers should run at
	pub fn compute_type(&self) -> &'static str {
		match self {
			Device::Cuda => "float16",
			Device::Cpu => "int8",
		}
	}
}

/// Total memory of the first GPU in bytes, probed once.
pub fn total_memory() -> Option<u64> {
	*TOTAL_MEMORY.get_or_init(|| {
		let output = Command::new("nvidia-smi")
			.arg("--query-gpu=memory.total")
			.arg("--format=csv,noheader,nounits")
			.stderr(Stdio::null())
			.output()
			.ok()?;
		if !output.status.success() {
			return None;
		}
		parse_memory_mib(&String::from_utf8_lossy(&output.stdout)).map(|mib| mib * MIB)
	})
}

pub fn device() -> Device {
	if total_memory().is_some() {
		Device::Cuda
	} else {
		Device::Cpu
	}
}

/// Memory a chat model may claim, as the `max_memory` string transformers takes.
pub fn memory_budget(fraction: f32) -> Option<String> {
	total_memory().map(|bytes| format_budget(bytes, fraction))
}

fn format_budget(bytes: u64, fraction: f32) -> String {
	let mib = (bytes / MIB) as f64 * fraction as f64;
	format!("{}MiB", mib.floor() as u64)
}

fn parse_memory_mib(stdout: &str) -> Option<u64> {
	stdout.lines().next()?.trim().parse().ok()
}
