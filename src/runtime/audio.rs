//! # Audio Preparation
//!
//! Converts arbitrary audio or video files to the 16 kHz mono WAV the
//! speech worker expects, using the FFmpeg command line tools.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use crate::config::SPEECH_SAMPLE_RATE;
use crate::ui;

static FFMPEG_AVAILABLE: OnceLock<bool> = OnceLock::new();
static CUSTOM_FFMPEG: OnceLock<PathBuf> = OnceLock::new();

pub fn set_ffmpeg_path(path: PathBuf) {
	let _ = CUSTOM_FFMPEG.set(path);
}

fn tool_binary(tool_name: &str) -> String {
	if let Some(custom) = CUSTOM_FFMPEG.get() {
		if tool_name == "ffmpeg" {
			return custom.to_string_lossy().to_string();
		}
		// ffprobe normally sits next to ffmpeg
		if let Some(parent) = custom.parent() {
			let tool_path = parent.join(tool_name);
			if tool_path.exists() {
				return tool_path.to_string_lossy().to_string();
			}
			let tool_exe = parent.join(format!("{}.exe", tool_name));
			if tool_exe.exists() {
				return tool_exe.to_string_lossy().to_string();
			}
		}
	}
	tool_name.to_string()
}

/// Check if FFmpeg is available
pub fn is_available() -> bool {
	*FFMPEG_AVAILABLE.get_or_init(|| {
		Command::new(tool_binary("ffmpeg"))
			.arg("-version")
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.status()
			.map(|s| s.success())
			.unwrap_or(false)
	})
}

/// Resamples `input` into `output` as 16-bit mono WAV.
pub fn convert_to_wav(input: &Path, output: &Path) -> Result<()> {
	if !is_available() {
		anyhow::bail!("FFmpeg not found in PATH (use --ffmpeg to point at it)");
	}
	if !input.is_file() {
		anyhow::bail!("Audio file not found: {}", input.display());
	}
	if let Some(parent) = output.parent() {
		std::fs::create_dir_all(parent)
			.with_context(|| format!("Failed to create {}", parent.display()))?;
	}

	let result = Command::new(tool_binary("ffmpeg"))
		.arg("-y")
		.arg("-v")
		.arg("error")
		.arg("-i")
		.arg(input)
		.arg("-vn")
		.arg("-ac")
		.arg("1")
		.arg("-ar")
		.arg(SPEECH_SAMPLE_RATE.to_string())
		.arg("-c:a")
		.arg("pcm_s16le")
		.arg(output)
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.output()
		.context("Failed to run FFmpeg")?;

	if !result.status.success() {
		let stderr = String::from_utf8_lossy(&result.stderr);
		anyhow::bail!("FFmpeg could not convert {}: {}", input.display(), stderr.trim());
	}

	ui::debug(&format!("Converted {} -> {}", input.display(), output.display()));
	Ok(())
}

#[derive(Deserialize)]
struct ProbeFormat {
	duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOutput {
	format: ProbeFormat,
}

/// Duration in seconds, `None` if ffprobe is missing or cannot tell.
pub fn probe_duration(path: &Path) -> Option<f64> {
	let output = Command::new(tool_binary("ffprobe"))
		.arg("-v")
		.arg("error")
		.arg("-print_format")
		.arg("json")
		.arg("-show_format")
		.arg(path)
		.stderr(Stdio::null())
		.output()
		.ok()?;

	if !output.status.success() {
		return None;
	}
	parse_probe_duration(&output.stdout)
}

fn parse_probe_duration(stdout: &[u8]) -> Option<f64> {
	let probe: ProbeOutput = serde_json::from_slice(stdout).ok()?;
	probe.format.duration?.parse().ok()
}

/// Removes everything in the temp directory, returning how many files went.
pub fn clear_temp(dir: &Path) -> Result<usize> {
	if !dir.exists() {
		return Ok(0);
	}

	let mut removed = 0;
	for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
		let path = entry?.path();
		if path.is_file() {
			std::fs::remove_file(&path)
				.with_context(|| format!("Failed to remove {}", path.display()))?;
			removed += 1;
		}
	}
	Ok(removed)
}
