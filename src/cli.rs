use clap::builder::styling::{AnsiColor, Color, Style};
use clap::{builder::Styles, Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::core::Resolution;
use crate::services::{ImageRequest, TranscribeRequest};

fn parse_seconds(s: &str) -> Result<u64, String> {
	let secs: u64 = s.parse().map_err(|_| format!("'{}' is not a whole number of seconds", s))?;
	if secs == 0 {
		Err("idle timeout must be at least 1 second".to_string())
	} else {
		Ok(secs)
	}
}

fn styles() -> Styles {
	Styles::styled()
		.header(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Blue))))
		.usage(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Blue))))
		.literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue))))
		.placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
		.valid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue))))
		.invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))))
}

#[derive(Parser, Debug)]
#[command(
	name = "triad",
	author,
	version,
	about = "Chat, image and speech models that load on demand and leave when idle",
	styles = styles(),
	disable_help_subcommand = true,
	after_help = format!(
		"{title}
  {triad} {chat}        {chat_args}           {chat_desc}
  {triad} {image}       {image_args}  {image_desc}
  {triad} {transcribe}  {transcribe_args}      {transcribe_desc}
  {triad} {session}     {session_args}      {session_desc}
  {triad} {help}        {help_args}                  {help_desc}",
		title = "Examples:".bright_blue().bold(),
		triad = "triad".bright_blue(),
		chat = "chat".yellow(),
		chat_args = "-m Qwen2.5",
		chat_desc = "Interactive chat".dimmed(),
		image = "image".yellow(),
		image_args = "\"a red fox\" -u realistic",
		image_desc = "Generate and upscale".dimmed(),
		transcribe = "transcribe".yellow(),
		transcribe_args = "talk.mp3 -l es",
		transcribe_desc = "Text and subtitles".dimmed(),
		session = "session".yellow(),
		session_args = "--idle-timeout 60",
		session_desc = "All three in one REPL".dimmed(),
		help = "help".yellow(),
		help_args = "image",
		help_desc = "Show help for image".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	/// Directory holding models/, saved_chats/ and outputs/ (default: $TRIAD_HOME or .)
	#[arg(long = "home", global = true, value_name = "DIR")]
	pub home: Option<PathBuf>,

	/// Seconds a model may sit unused before it is unloaded
	#[arg(long = "idle-timeout", global = true, value_name = "SECS", value_parser = parse_seconds)]
	pub idle_timeout: Option<u64>,

	/// Custom FFmpeg executable path
	#[arg(long = "ffmpeg", global = true, value_name = "PATH")]
	pub ffmpeg: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Talk to a chat model (interactive without a message)
	Chat {
		/// Single message to answer
		#[arg(value_name = "MESSAGE")]
		message: Option<String>,

		/// Chat model alias or full name
		#[arg(short = 'm', long = "model", value_name = "MODEL")]
		model: Option<String>,

		/// Continue a saved conversation
		#[arg(short = 'l', long = "load", value_name = "FILE")]
		load: Option<String>,

		/// Save the conversation under this name when done
		#[arg(short = 's', long = "save", value_name = "NAME")]
		save: Option<String>,
	},

	/// Generate an image from a text prompt
	Image(ImageArgs),

	/// Transcribe an audio or video file
	Transcribe(TranscribeArgs),

	/// Manage saved conversations
	Chats {
		#[command(subcommand)]
		action: ChatsAction,
	},

	/// List available models and whether their files are present
	Models,

	/// Interactive session hosting chat, image and speech together
	Session {
		/// Chat model to start with
		#[arg(short = 'm', long = "model", value_name = "MODEL")]
		model: Option<String>,
	},

	/// Show help for a subcommand
	Help {
		/// Subcommand name
		subcommand: Option<String>,
	},
}

#[derive(Subcommand, Debug)]
pub enum ChatsAction {
	/// List saved conversations, newest first
	List,

	/// Print a saved conversation
	Show {
		#[arg(value_name = "FILE")]
		name: String,
	},

	/// Delete a saved conversation
	Delete {
		#[arg(value_name = "FILE")]
		name: String,
	},

	/// Remove the autosave of the current chat
	Clear,
}

/// Options shared by `triad image` and the session's `:image`.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
	/// What to draw
	#[arg(value_name = "PROMPT", required = true, num_args = 1..)]
	pub prompt: Vec<String>,

	/// Image model key
	#[arg(short = 'm', long = "model", default_value = crate::config::DEFAULT_IMAGE_MODEL)]
	pub model: String,

	/// Output size as WxH (default: the model's first preset)
	#[arg(short = 'r', long = "resolution", value_name = "WxH")]
	pub resolution: Option<Resolution>,

	/// Seed, -1 for random
	#[arg(short = 's', long = "seed", allow_negative_numbers = true)]
	pub seed: Option<i64>,

	/// Upscaler: none, realistic, anime, general
	#[arg(short = 'u', long = "upscaler", default_value = "none")]
	pub upscaler: String,

	/// Open the final image in the default viewer
	#[arg(short = 'o', long = "open")]
	pub open: bool,
}

impl ImageArgs {
	pub fn request(&self) -> ImageRequest {
		ImageRequest {
			prompt: self.prompt.join(" "),
			model: self.model.clone(),
			resolution: self.resolution,
			seed: self.seed,
			upscaler: Some(self.upscaler.clone()),
		}
	}
}

/// Options shared by `triad transcribe` and the session's `:transcribe`.
#[derive(Args, Debug, Clone)]
pub struct TranscribeArgs {
	/// Input media file
	#[arg(value_name = "AUDIO")]
	pub audio: PathBuf,

	/// auto, turbo or accurate
	#[arg(short = 'm', long = "mode", default_value = "auto")]
	pub mode: String,

	/// Language name or code, auto to detect
	#[arg(short = 'l', long = "language", default_value = "auto")]
	pub language: String,
}

impl TranscribeArgs {
	pub fn request(&self) -> TranscribeRequest {
		let mut request = TranscribeRequest::new(&self.audio);
		request.mode = self.mode.clone();
		request.language = self.language.clone();
		request
	}
}

/// `:image` inside a session.
#[derive(Parser, Debug)]
#[command(name = ":image", styles = styles(), disable_version_flag = true)]
pub struct ImageLine {
	#[command(flatten)]
	pub args: ImageArgs,
}

/// `:transcribe` inside a session.
#[derive(Parser, Debug)]
#[command(name = ":transcribe", styles = styles(), disable_version_flag = true)]
pub struct TranscribeLine {
	#[command(flatten)]
	pub args: TranscribeArgs,
}
