//! Chat messages, prompt assembly and transcript titles

use serde::{Deserialize, Serialize};
use std::fmt;

use super::catalog::ChatModel;
use crate::config::{DEFAULT_CHAT_MODEL, DEFAULT_SYSTEM_PROMPT, TITLE_MAX_CHARS, TITLE_MIN_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Role::System => "System",
			Role::User => "User",
			Role::Assistant => "Assistant",
		};
		f.write_str(label)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
}

impl ChatMessage {
	pub fn user(content: impl Into<String>) -> Self {
		Self {
			role: Role::User,
			content: content.into(),
		}
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self {
			role: Role::Assistant,
			content: content.into(),
		}
	}
}

/// A conversation as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
	#[serde(default = "default_model")]
	pub model: String,
	#[serde(default)]
	pub history: Vec<ChatMessage>,
}

impl Conversation {
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			history: Vec::new(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.history.is_empty()
	}

	/// Name used when saving without an explicit title
	pub fn derived_title(&self) -> String {
		self.history
			.iter()
			.find(|m| m.role == Role::User && m.content.chars().count() > TITLE_MIN_CHARS)
			.map(|m| sanitize_title(&m.content.chars().take(TITLE_MAX_CHARS).collect::<String>()))
			.filter(|t| !t.is_empty())
			.unwrap_or_else(|| "chat".to_string())
	}
}

fn default_model() -> String {
	DEFAULT_CHAT_MODEL.to_string()
}

impl Default for Conversation {
	fn default() -> Self {
		Self::new(DEFAULT_CHAT_MODEL)
	}
}

/// Explicit name if given, otherwise one derived from the conversation.
pub fn title_for(conversation: &Conversation, name: &str) -> String {
	let explicit = sanitize_title(name);
	if explicit.is_empty() {
		conversation.derived_title()
	} else {
		explicit
	}
}

fn sanitize_title(raw: &str) -> String {
	raw.trim()
		.replace(' ', "_")
		.chars()
		.filter(|c| !matches!(c, '?' | '.' | '/' | '\\' | ':' | '*' | '"' | '<' | '>' | '|'))
		.collect()
}

/// Builds the completion prompt for one user turn.
pub fn build_prompt(model: Option<&ChatModel>, history: &[ChatMessage], message: &str) -> String {
	let mut prompt = String::from(DEFAULT_SYSTEM_PROMPT);
	if let Some(model) = model {
		prompt.push('\n');
		prompt.push_str(model.persona);
	}
	prompt.push_str("\n\n");

	for msg in history {
		prompt.push_str(&format!("{}: {}\n", msg.role, msg.content));
	}
	prompt.push_str(&format!("User: {}\nAssistant:", message));
	prompt
}

/// Cuts a raw completion down to the assistant's reply.
///
/// Completion models keep going past their turn; anything after the next
/// `User:` is discarded, as is any echoed `Assistant:` prefix.
pub fn clean_reply(raw: &str) -> String {
	let before_user = raw.split("User:").next().unwrap_or_default();
	before_user
		.rsplit("Assistant:")
		.next()
		.unwrap_or_default()
		.trim()
		.to_string()
}
