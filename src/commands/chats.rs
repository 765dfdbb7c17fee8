//! Chats command - manage saved conversations

use anyhow::Result;
use chrono::{DateTime, Local};
use colored::Colorize;
use std::path::Path;

use crate::cli::ChatsAction;
use crate::config;
use crate::core::{Conversation, Role};
use crate::storage::transcripts;
use crate::ui;

pub fn run(action: &ChatsAction) -> Result<()> {
	let dir = config::chats_dir();
	match action {
		ChatsAction::List => list(&dir),
		ChatsAction::Show { name } => {
			let path = transcripts::resolve(&dir, name);
			if !path.exists() {
				ui::error(&format!("No saved chat named {}", name));
				std::process::exit(1);
			}
			show(&transcripts::load(&path)?);
			Ok(())
		}
		ChatsAction::Delete { name } => delete(&dir, name),
		ChatsAction::Clear => {
			if transcripts::clear(&dir)? {
				ui::success("Autosave cleared");
			} else {
				ui::info("No autosave to clear");
			}
			Ok(())
		}
	}
}

pub fn list(dir: &Path) -> Result<()> {
	let chats = transcripts::list(dir)?;
	if chats.is_empty() {
		ui::info("No saved chats");
		return Ok(());
	}

	ui::header(&format!("Saved chats ({})", chats.len()));
	for (i, chat) in chats.iter().enumerate() {
		let modified: DateTime<Local> = chat.modified.into();
		println!(
			"{} {} {}",
			format!("{:2}.", i + 1).bright_blue().bold(),
			ui::path_link(&chat.path, 60),
			modified.format("%Y-%m-%d %H:%M").to_string().dimmed()
		);
	}
	Ok(())
}

pub fn delete(dir: &Path, name: &str) -> Result<()> {
	let path = transcripts::resolve(dir, name);
	if transcripts::delete(&path)? {
		ui::success(&format!("Deleted {}", path.display()));
	} else {
		ui::warn(&format!("{} does not exist", path.display()));
	}
	Ok(())
}

pub fn show(conversation: &Conversation) {
	ui::header(&format!("{} ({} messages)", conversation.model, conversation.history.len()));
	for message in &conversation.history {
		let label = format!("{}:", message.role);
		let label = match message.role {
			Role::User => label.yellow().bold(),
			Role::Assistant => label.bright_blue().bold(),
			Role::System => label.dimmed(),
		};
		println!("{} {}", label, message.content);
	}
}
