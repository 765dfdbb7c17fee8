//! Transcription results and subtitle formatting

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
	pub start: f64,
	pub end: f64,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
	/// Audio length in seconds
	#[serde(default)]
	pub duration: f64,
	#[serde(default)]
	pub language: Option<String>,
	pub segments: Vec<Segment>,
}

impl Transcription {
	pub fn full_text(&self) -> String {
		self.segments
			.iter()
			.map(|s| s.text.trim())
			.filter(|t| !t.is_empty())
			.collect::<Vec<_>>()
			.join(" ")
	}

	pub fn to_srt(&self) -> String {
		self.segments
			.iter()
			.enumerate()
			.map(|(i, s)| {
				format!(
					"{}\n{} --> {}\n{}\n",
					i + 1,
					format_srt_time(s.start),
					format_srt_time(s.end),
					s.text.trim()
				)
			})
			.collect::<Vec<_>>()
			.join("\n")
	}
}

/// `HH:MM:SS,mmm`, milliseconds truncated
pub fn format_srt_time(seconds: f64) -> String {
	let seconds = seconds.max(0.0);
	let whole = seconds.trunc() as u64;
	let ms = ((seconds - seconds.trunc()) * 1000.0) as u64;
	format!(
		"{:02}:{:02}:{:02},{:03}",
		whole / 3600,
		(whole % 3600) / 60,
		whole % 60,
		ms
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> Transcription {
		Transcription {
			duration: 3725.5,
			language: Some("es".into()),
			segments: vec![
				Segment {
					start: 0.0,
					end: 1.5,
					text: " Hola a todos. ".into(),
				},
				Segment {
					start: 3723.25,
					end: 3725.5,
					text: "Adiós.".into(),
				},
			],
		}
	}

	#[test]
	fn srt_timestamps() {
		assert_eq!(format_srt_time(0.0), "00:00:00,000");
		assert_eq!(format_srt_time(1.5), "00:00:01,500");
		assert_eq!(format_srt_time(3723.25), "01:02:03,250");
		assert_eq!(format_srt_time(-2.0), "00:00:00,000");
	}

	#[test]
	fn full_text_joins_trimmed_segments() {
		assert_eq!(sample().full_text(), "Hola a todos. Adiós.");
	}

	#[test]
	fn srt_blocks() {
		let srt = sample().to_srt();
		assert_eq!(
			srt,
			"1\n00:00:00,000 --> 00:00:01,500\nHola a todos.\n\n2\n01:02:03,250 --> 01:02:05,500\nAdiós.\n"
		);
	}

	#[test]
	fn parses_worker_payload() {
		let json = r#"{"duration": 2.0, "segments": [{"start": 0.0, "end": 2.0, "text": "hi"}]}"#;
		let t: Transcription = serde_json::from_str(json).unwrap();
		assert_eq!(t.language, None);
		assert_eq!(t.segments.len(), 1);
	}
}
