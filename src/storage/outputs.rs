//! Output file naming

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{SUBTITLES_FILE, TRANSCRIPT_FILE};

pub fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// `output_<model>_<ts>_base.png` and `output_<model>_<ts>_final.png`
pub fn image_paths(dir: &Path, model: &str, timestamp: u64) -> (PathBuf, PathBuf) {
	let stem = format!("output_{}_{}", model, timestamp);
	(
		dir.join(format!("{}_base.png", stem)),
		dir.join(format!("{}_final.png", stem)),
	)
}

/// Plain text and SRT destinations
pub fn transcript_paths(dir: &Path) -> (PathBuf, PathBuf) {
	(dir.join(TRANSCRIPT_FILE), dir.join(SUBTITLES_FILE))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn image_names() {
		let (base, last) = image_paths(Path::new("outputs"), "juggernautxl", 1_700_000_000);
		assert_eq!(base, Path::new("outputs/output_juggernautxl_1700000000_base.png"));
		assert_eq!(last, Path::new("outputs/output_juggernautxl_1700000000_final.png"));
	}
}
