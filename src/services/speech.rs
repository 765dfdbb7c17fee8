//! # Speech to Text
//!
//! Whisper transcription. Input audio is normalised with FFmpeg first; the
//! result is written as plain text and as SRT subtitles.

use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{Failure, InferenceError, LoadError, ModelLoader, Orchestrator, Outcome};
use crate::config::{self, BEAM_SIZE, TEMP_AUDIO_FILE};
use crate::core::catalog::{language_code, resolve_speech_mode, speech_model, AUTO_MODE};
use crate::core::{SpeechModel, Transcription};
use crate::runtime::gpu::{self, Device};
use crate::runtime::{audio, invoke, PipelineHandle, Subsystem, WorkerCommand, WorkerLoader};
use crate::storage::outputs;
use crate::ui;

#[derive(Debug, Clone)]
pub struct TranscribeRequest {
	pub audio: PathBuf,
	/// `auto`, `turbo` or `accurate`
	pub mode: String,
	/// Language name, ISO code or `auto`
	pub language: String,
}

impl TranscribeRequest {
	pub fn new(audio: impl Into<PathBuf>) -> Self {
		Self {
			audio: audio.into(),
			mode: AUTO_MODE.to_string(),
			language: AUTO_MODE.to_string(),
		}
	}
}

#[derive(Debug, Serialize)]
struct TranscriptionJob<'a> {
	audio: &'a Path,
	beam_size: u32,
	language: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct TranscriptFiles {
	pub model: &'static str,
	pub transcription: Transcription,
	pub text_path: PathBuf,
	pub srt_path: PathBuf,
}

pub fn load_payload(model: &SpeechModel, models_dir: &Path, device: Device) -> Result<Value, LoadError> {
	let path = model.path(models_dir);
	if !path.is_dir() {
		return Err(LoadError::MissingFiles(path));
	}
	Ok(json!({
		"name": model.name,
		"path": path,
		"device": device.as_str(),
		"compute_type": device.compute_type(),
	}))
}

pub fn worker_loader(command: WorkerCommand) -> WorkerLoader {
	let models_dir = config::models_dir();
	WorkerLoader::new(Subsystem::Speech, command, move |mode| {
		let model = speech_model(mode).ok_or_else(|| LoadError::UnknownModel(mode.to_string()))?;
		load_payload(model, &models_dir, gpu::device())
	})
}

type Prepare = fn(&Path, &Path) -> anyhow::Result<()>;

pub struct SpeechService<L: ModelLoader> {
	orchestrator: Orchestrator<L>,
	temp_dir: PathBuf,
	outputs_dir: PathBuf,
	prepare: Prepare,
	gpu_memory: fn() -> Option<u64>,
}

impl<L> SpeechService<L>
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	pub fn new(orchestrator: Orchestrator<L>, temp_dir: PathBuf, outputs_dir: PathBuf) -> Self {
		Self {
			orchestrator,
			temp_dir,
			outputs_dir,
			prepare: audio::convert_to_wav,
			gpu_memory: gpu::total_memory,
		}
	}

	pub fn orchestrator(&self) -> &Orchestrator<L> {
		&self.orchestrator
	}

	/// Model a mode string maps to on this machine.
	pub fn resolve_mode(&self, mode: &str) -> Result<&'static SpeechModel, InferenceError> {
		if !mode.eq_ignore_ascii_case(AUTO_MODE) && speech_model(mode).is_none() {
			return Err(InferenceError::InvalidRequest(format!(
				"unknown mode '{}', expected auto, turbo or accurate",
				mode
			)));
		}
		Ok(resolve_speech_mode(mode, (self.gpu_memory)()))
	}

	pub fn transcribe(&self, request: &TranscribeRequest) -> Outcome<TranscriptFiles> {
		let prepared = self
			.resolve_mode(&request.mode)
			.and_then(|model| {
				let language = language_code(&request.language).map_err(InferenceError::InvalidRequest)?;
				Ok((model, language))
			})
			.and_then(|(model, language)| {
				let wav = self.temp_dir.join(TEMP_AUDIO_FILE);
				(self.prepare)(&request.audio, &wav)
					.map_err(|e| InferenceError::InvalidRequest(format!("{:#}", e)))?;
				Ok((model, language, wav))
			});

		let (model, language, wav) = match prepared {
			Ok(prepared) => prepared,
			Err(e) => {
				ui::error(&format!("speech: {}", e));
				return Outcome::Failed(Failure::Inference(e));
			}
		};

		if let Some(duration) = audio::probe_duration(&request.audio) {
			ui::debug(&format!("Audio length {:.1}s", duration));
		}

		let job = TranscriptionJob {
			audio: &wav,
			beam_size: BEAM_SIZE,
			language,
		};
		let outputs_dir = &self.outputs_dir;

		self.orchestrator.handle_request(model.mode, |handle| {
			let transcription: Transcription = invoke(handle, &job)?;
			let (text_path, srt_path) = outputs::transcript_paths(outputs_dir);
			fs::create_dir_all(outputs_dir)?;
			fs::write(&text_path, transcription.full_text())?;
			fs::write(&srt_path, transcription.to_srt())?;

			Ok(TranscriptFiles {
				model: model.mode,
				transcription,
				text_path,
				srt_path,
			})
		})
	}

	/// Clears the converted audio left in the temp directory.
	pub fn reset(&self) -> anyhow::Result<usize> {
		audio::clear_temp(&self.temp_dir)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::testing::{scripted, Scripted, ScriptedLoader};

	const GIB: u64 = 1024 * 1024 * 1024;

	fn copy_audio(input: &Path, output: &Path) -> anyhow::Result<()> {
		fs::create_dir_all(output.parent().unwrap())?;
		fs::copy(input, output)?;
		Ok(())
	}

	fn whisper(_model: &str, _request: &Value) -> Result<Value, InferenceError> {
		Ok(json!({
			"duration": 4.0,
			"language": "es",
			"segments": [
				{ "start": 0.0, "end": 1.5, "text": " Hola." },
				{ "start": 1.5, "end": 4.0, "text": " ¿Qué tal?" }
			]
		}))
	}

	struct Fixture {
		service: SpeechService<ScriptedLoader>,
		script: Scripted,
		home: tempfile::TempDir,
		audio: PathBuf,
	}

	fn fixture(gpu_memory: fn() -> Option<u64>) -> Fixture {
		let home = tempfile::tempdir().unwrap();
		let audio = home.path().join("clip.mp3");
		fs::write(&audio, b"ID3").unwrap();

		let (orchestrator, script) = scripted(whisper);
		let mut service = SpeechService::new(orchestrator, home.path().join("temp"), home.path().join("outputs"));
		service.prepare = copy_audio;
		service.gpu_memory = gpu_memory;
		Fixture {
			service,
			script,
			home,
			audio,
		}
	}

	fn small_gpu() -> Option<u64> {
		Some(8 * GIB)
	}

	fn large_gpu() -> Option<u64> {
		Some(24 * GIB)
	}

	#[test]
	fn writes_text_and_subtitles() {
		let f = fixture(small_gpu);
		let mut request = TranscribeRequest::new(&f.audio);
		request.language = "Spanish".into();

		let files = f.service.transcribe(&request).completed().unwrap();
		assert_eq!(files.model, "turbo");
		assert_eq!(fs::read_to_string(&files.text_path).unwrap(), "Hola. ¿Qué tal?");
		assert!(fs::read_to_string(&files.srt_path)
			.unwrap()
			.starts_with("1\n00:00:00,000 --> 00:00:01,500\nHola.\n\n2\n"));

		let job = &f.script.requests()[0];
		assert_eq!(job["beam_size"], 5);
		assert_eq!(job["language"], "es");
		assert!(job["audio"].as_str().unwrap().ends_with("input.wav"));
	}

	#[test]
	fn auto_mode_uses_accurate_on_large_gpu() {
		let f = fixture(large_gpu);
		let files = f.service.transcribe(&TranscribeRequest::new(&f.audio)).completed().unwrap();
		assert_eq!(files.model, "accurate");
		assert!(f.script.requests()[0]["language"].is_null());
		assert_eq!(f.script.loads(), vec!["accurate".to_string()]);
	}

	#[test]
	fn invalid_options_never_load() {
		let f = fixture(small_gpu);

		let mut request = TranscribeRequest::new(&f.audio);
		request.mode = "fastest".into();
		assert!(!f.service.transcribe(&request).is_completed());

		let mut request = TranscribeRequest::new(&f.audio);
		request.language = "Klingon".into();
		assert!(!f.service.transcribe(&request).is_completed());

		let request = TranscribeRequest::new(f.home.path().join("nope.mp3"));
		assert!(matches!(
			f.service.transcribe(&request).failure(),
			Some(Failure::Inference(InferenceError::InvalidRequest(_)))
		));

		assert!(f.script.loads().is_empty());
	}

	#[test]
	fn reset_clears_temp_audio() {
		let f = fixture(small_gpu);
		f.service.transcribe(&TranscribeRequest::new(&f.audio)).completed().unwrap();
		assert_eq!(f.service.reset().unwrap(), 1);
		assert!(!f.home.path().join("temp").join(TEMP_AUDIO_FILE).exists());
	}

	#[test]
	fn payload_requires_model_dir() {
		let home = tempfile::tempdir().unwrap();
		let model = speech_model("turbo").unwrap();
		assert!(matches!(
			load_payload(model, home.path(), Device::Cpu),
			Err(LoadError::MissingFiles(_))
		));

		fs::create_dir_all(model.path(home.path())).unwrap();
		let payload = load_payload(model, home.path(), Device::Cpu).unwrap();
		assert_eq!(payload["compute_type"], "int8");
	}
}
