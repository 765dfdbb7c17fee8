//! # Services
//!
//! The three subsystems, each owning one cached model slot.

pub mod chat;
pub mod image;
pub mod speech;

use anyhow::Result;
use std::time::Duration;

use crate::cache::{Orchestrator, SlotStatus};
use crate::config;
use crate::runtime::{Subsystem, WorkerLoader, WorkerSettings};

pub use chat::ChatService;
pub use image::{GeneratedImage, ImageRequest, ImageService};
pub use speech::{SpeechService, TranscribeRequest, TranscriptFiles};

/// All three subsystems backed by worker processes.
pub struct Services {
	pub chat: ChatService<WorkerLoader>,
	pub image: ImageService<WorkerLoader>,
	pub speech: SpeechService<WorkerLoader>,
}

impl Services {
	pub fn start(idle: Duration) -> Result<Self> {
		let settings = WorkerSettings::load()?;
		Ok(Self {
			chat: chat_service(&settings, idle),
			image: image_service(&settings, idle),
			speech: speech_service(&settings, idle),
		})
	}

	/// `true` if a model was actually unloaded.
	pub fn unload(&self, subsystem: Subsystem) -> bool {
		match subsystem {
			Subsystem::Chat => self.chat.orchestrator().unload(),
			Subsystem::Image => self.image.orchestrator().unload(),
			Subsystem::Speech => self.speech.orchestrator().unload(),
		}
	}

	pub fn statuses(&self) -> [SlotStatus; 3] {
		[
			self.chat.orchestrator().status(),
			self.image.orchestrator().status(),
			self.speech.orchestrator().status(),
		]
	}
}

pub fn chat_service(settings: &WorkerSettings, idle: Duration) -> ChatService<WorkerLoader> {
	let loader = chat::worker_loader(settings.command(Subsystem::Chat).clone());
	ChatService::new(Orchestrator::new(Subsystem::Chat.label(), loader, idle)).with_autosave(config::chats_dir())
}

pub fn image_service(settings: &WorkerSettings, idle: Duration) -> ImageService<WorkerLoader> {
	let loader = image::worker_loader(settings.command(Subsystem::Image).clone());
	ImageService::new(
		Orchestrator::new(Subsystem::Image.label(), loader, idle),
		config::models_dir(),
		config::outputs_dir(),
	)
}

pub fn speech_service(settings: &WorkerSettings, idle: Duration) -> SpeechService<WorkerLoader> {
	let loader = speech::worker_loader(settings.command(Subsystem::Speech).clone());
	SpeechService::new(
		Orchestrator::new(Subsystem::Speech.label(), loader, idle),
		config::temp_dir(),
		config::outputs_dir(),
	)
}

#[cfg(test)]
pub(crate) mod testing {
	use serde_json::Value;
	use std::path::PathBuf;
	use std::sync::{Arc, Mutex};
	use std::time::Duration;

	use crate::cache::{IdleEvictionTimer, InferenceError, LoadError, ManualClock, ModelLoader, Orchestrator};
	use crate::runtime::PipelineHandle;

	pub type Reply = fn(&str, &Value) -> Result<Value, InferenceError>;

	/// Shared record of what the scripted pipelines saw.
	#[derive(Clone, Default)]
	pub struct Scripted {
		loads: Arc<Mutex<Vec<String>>>,
		requests: Arc<Mutex<Vec<Value>>>,
	}

	impl Scripted {
		pub fn loads(&self) -> Vec<String> {
			self.loads.lock().unwrap().clone()
		}

		pub fn requests(&self) -> Vec<Value> {
			self.requests.lock().unwrap().clone()
		}
	}

	/// Answers every request with `reply`. Names starting with `missing`
	/// fail to load.
	pub struct ScriptedLoader {
		reply: Reply,
		script: Scripted,
	}

	pub struct ScriptedPipeline {
		model: String,
		reply: Reply,
		script: Scripted,
	}

	impl ModelLoader for ScriptedLoader {
		type Handle = ScriptedPipeline;

		fn load(&self, name: &str) -> Result<ScriptedPipeline, LoadError> {
			if name.starts_with("missing") {
				return Err(LoadError::MissingFiles(PathBuf::from("models").join(name)));
			}
			self.script.loads.lock().unwrap().push(name.to_string());
			Ok(ScriptedPipeline {
				model: name.to_string(),
				reply: self.reply,
				script: self.script.clone(),
			})
		}
	}

	impl PipelineHandle for ScriptedPipeline {
		fn run(&self, request: &Value) -> Result<Value, InferenceError> {
			self.script.requests.lock().unwrap().push(request.clone());
			(self.reply)(&self.model, request)
		}
	}

	/// An orchestrator with a manual clock, so nothing is evicted mid-test.
	pub fn scripted(reply: Reply) -> (Orchestrator<ScriptedLoader>, Scripted) {
		let script = Scripted::default();
		let loader = ScriptedLoader {
			reply,
			script: script.clone(),
		};
		let timer = IdleEvictionTimer::manual(Duration::from_secs(120), Arc::new(ManualClock::new()));
		(Orchestrator::with_timer("test", loader, timer), script)
	}
}
