//! Unified logging system

use chrono::Local;
use colored::*;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

const LOGO: &str = r#"
  ______     _           __
 /_  __/____(_)___ _____/ /
  / / / ___/ / __ `/ __  /
 / / / /  / / /_/ / /_/ /
/_/ /_/  /_/\__,_/\__,_/   "#;

const SLOGANS: &[&str] = &[
	"Three models walk into a GPU...",
	"Only one of us fits in VRAM at a time",
	"Loaded on demand, gone when you nap",
	"Chat, paint, listen. Repeat.",
	"Two minutes of silence and the weights go home",
	"Your VRAM called, it wants its gigabytes back",
	"Whisper quietly, the diffusion model is sleeping",
	"Powered by some oxidizing glue code",
];

pub fn random_slogan() -> &'static str {
	let idx = rand::rng().random_range(0..SLOGANS.len());
	SLOGANS[idx]
}

pub fn print_logo() {
	println!("{}", LOGO.bright_blue().bold());
	println!("{}", random_slogan().dimmed().italic());
}

pub struct Log;

impl Log {
	pub fn set_verbose(enabled: bool) {
		VERBOSE.store(enabled, Ordering::Relaxed);
	}

	pub fn is_verbose() -> bool {
		VERBOSE.load(Ordering::Relaxed)
	}
}

pub fn info(msg: &str) {
	println!("{} {}", "ℹ".bright_blue().bold(), msg.bright_white());
}

pub fn success(msg: &str) {
	println!("{} {}", "✓".bright_green().bold(), msg.bright_white());
}

pub fn warn(msg: &str) {
	println!("{} {}", "⚠".bright_yellow().bold(), msg.bright_white());
}

pub fn error(msg: &str) {
	println!("{} {}", "✗".bright_red().bold(), msg.bright_white());
}

pub fn debug(msg: &str) {
	if Log::is_verbose() {
		println!("{} {}", "⚙".bright_black().bold(), msg.dimmed());
	}
}

/// Timestamped message for things that happen off the request path.
pub fn event(msg: &str) {
	let time = Local::now().format("%H:%M:%S").to_string().dimmed();
	println!("[{}] {} {}", time, "⏱".bright_magenta().bold(), msg.bright_white());
}

pub fn header(text: &str) {
	println!("\n{}", text.bright_blue().bold());
}

/// Clickable file path (OSC 8 terminal hyperlink)
pub fn path_link(path: &std::path::Path, max_len: usize) -> String {
	let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

	let uri = if cfg!(windows) {
		let path_str = absolute.to_string_lossy();
		let cleaned = path_str.strip_prefix(r"\\?\").unwrap_or(&path_str);
		format!("file:///{}", cleaned.replace('\\', "/"))
	} else {
		format!("file://{}", absolute.display())
	};

	let filename = path
		.file_name()
		.and_then(|n| n.to_str())
		.unwrap_or("unknown");

	format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", uri, shorten(filename, max_len))
}

/// Elides the middle of long names, keeping both ends.
pub fn shorten(name: &str, max_len: usize) -> String {
	let chars: Vec<char> = name.chars().collect();
	if chars.len() <= max_len || max_len < 8 {
		return name.to_string();
	}
	let head = max_len / 2;
	let tail = max_len - head - 3;
	let start: String = chars[..head].iter().collect();
	let end: String = chars[chars.len() - tail..].iter().collect();
	format!("{}...{}", start, end)
}

/// Log a written output file with its elapsed time
pub fn file_written(path: &std::path::Path, duration_ms: u128) {
	let link = path_link(path, 60);
	success(&format!(
		"{} {}",
		link.bright_white(),
		format!("{}ms", duration_ms).dimmed()
	));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn shorten_keeps_short_names() {
		assert_eq!(shorten("output.png", 20), "output.png");
	}

	#[test]
	fn shorten_elides_middle() {
		let name = "output_realisticvision-v6_1760000000_final.png";
		let short = shorten(name, 20);
		assert_eq!(short.chars().count(), 20);
		assert!(short.starts_with("output_rea"));
		assert!(short.ends_with("nal.png"));
		assert!(short.contains("..."));
	}
}
