//! Models command - catalog overview with local availability

use anyhow::Result;
use colored::Colorize;

use crate::config;
use crate::core::catalog::{CHAT_MODELS, IMAGE_MODELS, SPEECH_MODELS, UPSCALERS};
use crate::runtime::{audio, gpu};
use crate::ui;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn mark(present: bool) -> colored::ColoredString {
	if present {
		"✓".bright_green().bold()
	} else {
		"·".dimmed()
	}
}

pub fn run() -> Result<()> {
	let models_dir = config::models_dir();

	ui::header("Chat");
	for model in CHAT_MODELS {
		println!(
			"  {} {:<12} {} {}",
			mark(model.cache_dir(&models_dir).is_dir()),
			model.alias.bright_blue(),
			model.name,
			model.repo_id.dimmed()
		);
	}

	ui::header("Image");
	for model in IMAGE_MODELS {
		let sizes: Vec<String> = model.resolutions.iter().map(|r| r.to_string()).collect();
		println!(
			"  {} {:<19} {} {}",
			mark(model.path(&models_dir).is_file()),
			model.key.bright_blue(),
			model.name,
			format!("({} VRAM)", model.vram_required).dimmed()
		);
		println!("      {}", sizes.join(" ").dimmed());
	}

	ui::header("Upscalers");
	for upscaler in UPSCALERS {
		println!(
			"  {} {:<10} {}",
			mark(upscaler.path(&models_dir).is_file()),
			upscaler.key.bright_blue(),
			upscaler.name
		);
	}

	ui::header("Speech");
	for model in SPEECH_MODELS {
		println!(
			"  {} {:<9} {} {}",
			mark(model.path(&models_dir).is_dir()),
			model.mode.bright_blue(),
			model.name,
			format!("(needs {:.0} GiB)", model.vram_bytes as f64 / GIB).dimmed()
		);
	}

	println!();
	match gpu::total_memory() {
		Some(bytes) => ui::info(&format!("GPU memory: {:.1} GiB", bytes as f64 / GIB)),
		None => ui::warn("No NVIDIA GPU detected, workers will run on CPU"),
	}
	if !audio::is_available() {
		ui::warn("FFmpeg not found, transcription is unavailable");
	}
	ui::debug(&format!("Models directory: {}", models_dir.display()));
	Ok(())
}
