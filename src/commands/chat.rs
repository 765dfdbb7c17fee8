//! Chat command - one turn, or an interactive conversation

use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cache::{ModelLoader, Outcome};
use crate::commands::session;
use crate::config;
use crate::runtime::{PipelineHandle, WorkerSettings};
use crate::services::{self, ChatService, Services};
use crate::storage::transcripts;
use crate::ui;

pub fn run(message: Option<&str>, model: Option<&str>, load: Option<&str>, save: Option<&str>) -> Result<()> {
	let conversation = match load {
		Some(name) => {
			let path = transcripts::resolve(&config::chats_dir(), name);
			let conversation = transcripts::load(&path)?;
			ui::info(&format!(
				"Loaded {} messages ({})",
				conversation.history.len(),
				conversation.model
			));
			Some(conversation)
		}
		None => None,
	};

	match message {
		Some(message) => {
			let settings = WorkerSettings::load()?;
			let mut chat = services::chat_service(&settings, config::idle_timeout());
			prepare(&mut chat, conversation, model)?;

			if !ask(&mut chat, message) {
				// exit skips destructors; shut the worker down first
				drop(chat);
				std::process::exit(1);
			}
			finish(&chat, save)
		}
		None => {
			let mut services = Services::start(config::idle_timeout())?;
			prepare(&mut services.chat, conversation, model)?;
			session::repl(&mut services)?;
			finish(&services.chat, save)
		}
	}
}

fn prepare<L>(chat: &mut ChatService<L>, conversation: Option<crate::core::Conversation>, model: Option<&str>) -> Result<()>
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	if let Some(conversation) = conversation {
		chat.set_conversation(conversation);
	}
	if let Some(model) = model {
		chat.switch_model(model)?;
	}
	Ok(())
}

fn finish<L>(chat: &ChatService<L>, save: Option<&str>) -> Result<()>
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	if let Some(name) = save {
		if chat.conversation().is_empty() {
			ui::warn("Nothing to save");
			return Ok(());
		}
		let path = transcripts::save(&config::chats_dir(), chat.conversation(), name)?;
		ui::success(&format!("Saved {}", ui::path_link(&path, 60)));
	}
	Ok(())
}

/// Sends one message and prints the reply. `false` if it failed.
pub fn ask<L>(chat: &mut ChatService<L>, message: &str) -> bool
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	if !chat.orchestrator().slot().is_resident(chat.model()) {
		ui::info(&format!("Loading {}...", chat.model()));
	}

	let start = Instant::now();
	match chat.respond(message) {
		Outcome::Completed(reply) => {
			println!("{} {}", format!("{}:", chat.model()).bright_blue().bold(), reply);
			ui::debug(&format!("Answered in {:.2}s", start.elapsed().as_secs_f32()));
			true
		}
		// Already reported by the orchestrator
		Outcome::Failed(_) => false,
	}
}
