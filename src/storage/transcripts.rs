//! Saved chat transcripts
//!
//! Conversations are stored as pretty JSON under `saved_chats/`. The
//! autosave of the current chat goes to `_temp.json`; files starting
//! with `_` are hidden from listings.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::TEMP_CHAT_FILE;
use crate::core::chat::title_for;
use crate::core::Conversation;

const EXT: &str = "json";

/// A transcript found on disk.
#[derive(Debug, Clone)]
pub struct SavedChat {
	pub name: String,
	pub path: PathBuf,
	pub modified: SystemTime,
}

/// Saves under the sanitized `name`, or a title derived from the chat.
pub fn save(dir: &Path, conversation: &Conversation, name: &str) -> Result<PathBuf> {
	let path = dir.join(format!("{}.{}", title_for(conversation, name), EXT));
	write(&path, conversation)?;
	Ok(path)
}

pub fn write(path: &Path, conversation: &Conversation) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.with_context(|| format!("Failed to create {}", parent.display()))?;
	}
	let json = serde_json::to_string_pretty(conversation).context("Failed to serialize chat")?;
	fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes the running conversation to the autosave file.
pub fn autosave(dir: &Path, conversation: &Conversation) -> Result<()> {
	write(&dir.join(TEMP_CHAT_FILE), conversation)
}

/// Missing files give an empty conversation with the default model.
pub fn load(path: &Path) -> Result<Conversation> {
	if !path.exists() {
		return Ok(Conversation::default());
	}
	let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
	serde_json::from_str(&text).with_context(|| format!("Invalid chat transcript: {}", path.display()))
}

/// Maps a bare name like `notes` to `<dir>/notes.json`.
pub fn resolve(dir: &Path, name: &str) -> PathBuf {
	let candidate = Path::new(name);
	if candidate.components().count() > 1 || candidate.is_absolute() {
		return candidate.to_path_buf();
	}
	if candidate.extension().is_some_and(|e| e == EXT) {
		dir.join(candidate)
	} else {
		dir.join(format!("{}.{}", name, EXT))
	}
}

/// Saved transcripts, newest first.
pub fn list(dir: &Path) -> Result<Vec<SavedChat>> {
	if !dir.exists() {
		return Ok(Vec::new());
	}

	let mut chats = Vec::new();
	for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
		let entry = entry?;
		let path = entry.path();
		let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
			continue;
		};
		if file_name.starts_with('_') || path.extension().map_or(true, |e| e != EXT) {
			continue;
		}
		let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
		chats.push(SavedChat {
			name: file_name.to_string(),
			path,
			modified,
		});
	}

	chats.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
	Ok(chats)
}

/// `false` when there was nothing to delete.
pub fn delete(path: &Path) -> Result<bool> {
	if !path.exists() {
		return Ok(false);
	}
	fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))?;
	Ok(true)
}

/// Drops the autosave file.
pub fn clear(dir: &Path) -> Result<bool> {
	delete(&dir.join(TEMP_CHAT_FILE))
}
