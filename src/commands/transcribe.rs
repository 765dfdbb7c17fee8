//! Transcribe command - speech to text and subtitles

use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cache::{ModelLoader, Outcome};
use crate::config;
use crate::runtime::{PipelineHandle, WorkerSettings};
use crate::services::{self, SpeechService, TranscribeRequest};
use crate::ui;

pub fn run(request: TranscribeRequest) -> Result<()> {
	let settings = WorkerSettings::load()?;
	let service = services::speech_service(&settings, config::idle_timeout());

	let ok = transcribe(&service, &request);
	service.reset()?;
	if !ok {
		drop(service);
		std::process::exit(1);
	}
	Ok(())
}

/// Transcribes and reports one file. `false` if it failed.
pub fn transcribe<L>(service: &SpeechService<L>, request: &TranscribeRequest) -> bool
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	ui::info(&format!("Transcribing {}", ui::path_link(&request.audio, 60)));
	let start = Instant::now();

	let files = match service.transcribe(request) {
		Outcome::Completed(files) => files,
		Outcome::Failed(_) => return false,
	};

	let elapsed = start.elapsed().as_millis();
	let text = files.transcription.full_text();
	println!();
	if text.is_empty() {
		println!("  {}", "(no speech detected)".dimmed());
	} else {
		println!("  {}", text);
	}
	println!();

	let language = files.transcription.language.as_deref().unwrap_or("?");
	ui::debug(&format!(
		"{} segments, {:.1}s of audio, language {}, model {}",
		files.transcription.segments.len(),
		files.transcription.duration,
		language,
		files.model
	));
	ui::file_written(&files.text_path, elapsed);
	ui::file_written(&files.srt_path, elapsed);
	true
}
