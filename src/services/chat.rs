//! # Chat
//!
//! Prompted completion against the resident chat model with a running
//! conversation that is autosaved after every turn.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::cache::{Failure, InferenceError, LoadError, ModelLoader, Orchestrator, Outcome};
use crate::core::catalog::chat_model;
use crate::core::chat::{build_prompt, clean_reply};
use crate::core::{ChatMessage, ChatModel, Conversation};
use crate::runtime::gpu::{self, Device};
use crate::runtime::{invoke, PipelineHandle, Subsystem, WorkerCommand, WorkerLoader};
use crate::storage::transcripts;
use crate::{config, ui};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
	prompt: &'a str,
	max_new_tokens: u32,
	temperature: f32,
	top_p: f32,
	do_sample: bool,
}

#[derive(Debug, Deserialize)]
struct Completion {
	text: String,
}

/// What the chat worker needs to load `model`.
pub fn load_payload(model: &ChatModel, models_dir: &Path, device: Device, max_memory: Option<String>) -> Value {
	json!({
		"name": model.name,
		"repo_id": model.repo_id,
		"task": model.task,
		"cache_dir": model.cache_dir(models_dir),
		"trust_remote_code": model.trust_remote_code,
		"device": device.as_str(),
		"max_memory": max_memory,
	})
}

pub fn worker_loader(command: WorkerCommand) -> WorkerLoader {
	let models_dir = config::models_dir();
	WorkerLoader::new(Subsystem::Chat, command, move |name| {
		let model = chat_model(name).ok_or_else(|| LoadError::UnknownModel(name.to_string()))?;
		Ok(load_payload(
			model,
			&models_dir,
			gpu::device(),
			gpu::memory_budget(config::GPU_MEMORY_FRACTION),
		))
	})
}

pub struct ChatService<L: ModelLoader> {
	orchestrator: Orchestrator<L>,
	conversation: Conversation,
	autosave_dir: Option<PathBuf>,
}

impl<L> ChatService<L>
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	pub fn new(orchestrator: Orchestrator<L>) -> Self {
		Self {
			orchestrator,
			conversation: Conversation::default(),
			autosave_dir: None,
		}
	}

	/// Autosave each turn to `_temp.json` in `dir`.
	pub fn with_autosave(mut self, dir: PathBuf) -> Self {
		self.autosave_dir = Some(dir);
		self
	}

	pub fn orchestrator(&self) -> &Orchestrator<L> {
		&self.orchestrator
	}

	pub fn conversation(&self) -> &Conversation {
		&self.conversation
	}

	pub fn model(&self) -> &str {
		&self.conversation.model
	}

	/// Replaces the running conversation, e.g. with a loaded transcript.
	pub fn set_conversation(&mut self, conversation: Conversation) {
		self.conversation = conversation;
		self.conversation.model = canonical_name(&self.conversation.model);
	}

	/// Starts over with an empty history, keeping the model.
	pub fn reset(&mut self) {
		self.conversation.history.clear();
	}

	/// Switches the model for later turns. Loading happens on the next message.
	pub fn switch_model(&mut self, name: &str) -> Result<(), LoadError> {
		let model = chat_model(name).ok_or_else(|| LoadError::UnknownModel(name.to_string()))?;
		self.conversation.model = model.alias.to_string();
		Ok(())
	}

	/// One user turn. History only grows when the reply completed.
	pub fn respond(&mut self, message: &str) -> Outcome<String> {
		let message = message.trim();
		if message.is_empty() {
			ui::error("chat: empty message");
			return Outcome::Failed(Failure::Inference(InferenceError::InvalidRequest(
				"empty message".to_string(),
			)));
		}

		let model_name = self.conversation.model.clone();
		let model = chat_model(&model_name);
		let prompt = build_prompt(model, &self.conversation.history, message);
		let request = CompletionRequest {
			prompt: &prompt,
			max_new_tokens: model.map_or(1024, |m| m.max_new_tokens),
			temperature: model.map_or(0.7, |m| m.temperature),
			top_p: model.map_or(0.9, |m| m.top_p),
			do_sample: true,
		};

		let outcome = self.orchestrator.handle_request(&model_name, |handle| {
			let completion: Completion = invoke(handle, &request)?;
			Ok(clean_reply(&completion.text))
		});

		if let Outcome::Completed(reply) = &outcome {
			self.conversation.history.push(ChatMessage::user(message));
			self.conversation.history.push(ChatMessage::assistant(reply.clone()));
			self.autosave();
		}
		outcome
	}

	fn autosave(&self) {
		let Some(dir) = &self.autosave_dir else {
			return;
		};
		if let Err(e) = transcripts::autosave(dir, &self.conversation) {
			ui::warn(&format!("Autosave failed: {:#}", e));
		}
	}
}

/// Catalog alias for known names so one model never gets two cache keys.
fn canonical_name(name: &str) -> String {
	chat_model(name).map_or_else(|| name.to_string(), |m| m.alias.to_string())
}
