//! Session mode - one REPL hosting chat, image and speech
//!
//! Plain lines go to the chat model; `:` commands drive the other
//! subsystems. Models stay resident between requests and leave on their
//! own after the idle timeout.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use std::io::{self, Write};
use std::time::Duration;

use crate::cache::SlotStatus;
use crate::cli::{ImageLine, TranscribeLine};
use crate::commands::{chat, chats, image, transcribe};
use crate::config;
use crate::core::catalog::CHAT_MODELS;
use crate::core::Conversation;
use crate::runtime::Subsystem;
use crate::services::{ImageRequest, Services, TranscribeRequest};
use crate::storage::transcripts;
use crate::ui;

/// One parsed REPL line.
#[derive(Debug, PartialEq)]
enum Input<'a> {
	Empty,
	Chat(&'a str),
	Model(Option<&'a str>),
	Image(&'a str),
	Transcribe(&'a str),
	Save(Option<&'a str>),
	Load(&'a str),
	Chats,
	Delete(&'a str),
	New,
	/// `None` unloads everything
	Unload(Option<Subsystem>),
	Status,
	Help,
	Exit,
	Invalid(String),
}

fn parse(line: &str) -> Input<'_> {
	let line = line.trim();
	if line.is_empty() {
		return Input::Empty;
	}
	if matches!(line, "exit" | "quit" | "q") {
		return Input::Exit;
	}
	let Some(command) = line.strip_prefix(':') else {
		return Input::Chat(line);
	};

	let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
	let rest = rest.trim();
	let arg = (!rest.is_empty()).then_some(rest);

	match name {
		"model" => Input::Model(arg),
		"image" | "img" => match arg {
			Some(rest) => Input::Image(rest),
			None => Input::Invalid("usage: :image <prompt> [-m MODEL] [-r WxH] [-s SEED] [-u UPSCALER] [-o]".into()),
		},
		"transcribe" | "tr" => match arg {
			Some(rest) => Input::Transcribe(rest),
			None => Input::Invalid("usage: :transcribe <file> [-m MODE] [-l LANGUAGE]".into()),
		},
		"save" => Input::Save(arg),
		"load" => match arg {
			Some(rest) => Input::Load(rest),
			None => Input::Invalid("usage: :load <name>".into()),
		},
		"chats" => Input::Chats,
		"delete" => match arg {
			Some(rest) => Input::Delete(rest),
			None => Input::Invalid("usage: :delete <name>".into()),
		},
		"new" => Input::New,
		"unload" => match arg {
			None | Some("all") => Input::Unload(None),
			Some(target) => match Subsystem::parse(target) {
				Some(subsystem) => Input::Unload(Some(subsystem)),
				None => Input::Invalid(format!("unknown subsystem '{}', expected chat, image, speech or all", target)),
			},
		},
		"status" => Input::Status,
		"help" | "h" => Input::Help,
		other => Input::Invalid(format!("unknown command ':{}', try :help", other)),
	}
}

/// Splits a command line into words, keeping quoted runs together.
fn split_words(line: &str) -> Result<Vec<String>, String> {
	let mut words = Vec::new();
	let mut word = String::new();
	let mut in_word = false;
	let mut quote = None;

	for c in line.chars() {
		match (quote, c) {
			(Some(q), c) if c == q => quote = None,
			(Some(_), c) => word.push(c),
			(None, '"' | '\'') => {
				quote = Some(c);
				in_word = true;
			}
			(None, c) if c.is_whitespace() => {
				if in_word {
					words.push(std::mem::take(&mut word));
					in_word = false;
				}
			}
			(None, c) => {
				word.push(c);
				in_word = true;
			}
		}
	}
	if quote.is_some() {
		return Err("unterminated quote".into());
	}
	if in_word {
		words.push(word);
	}
	Ok(words)
}

fn parse_image(args: &str) -> Result<(ImageRequest, bool), clap::Error> {
	let words = split_words(args).map_err(|e| ImageLine::command().error(ErrorKind::InvalidValue, e))?;
	let line = ImageLine::try_parse_from(std::iter::once(":image".to_string()).chain(words))?;
	Ok((line.args.request(), line.args.open))
}

fn parse_transcribe(args: &str) -> Result<TranscribeRequest, clap::Error> {
	let words = split_words(args).map_err(|e| TranscribeLine::command().error(ErrorKind::InvalidValue, e))?;
	let line = TranscribeLine::try_parse_from(std::iter::once(":transcribe".to_string()).chain(words))?;
	Ok(line.args.request())
}

/// Help requests print usage; parse errors are reported like other session errors.
fn report(e: clap::Error) {
	match e.kind() {
		ErrorKind::DisplayHelp => print!("{}", e.render()),
		_ => ui::error(e.render().to_string().trim_start_matches("error: ").trim_end()),
	}
}

pub fn run(model: Option<&str>) -> Result<()> {
	let mut services = Services::start(config::idle_timeout())?;
	if let Some(model) = model {
		services.chat.switch_model(model)?;
	}
	repl(&mut services)
}

pub fn repl(services: &mut Services) -> Result<()> {
	ui::print_logo();
	println!();
	ui::info(&format!(
		"Chatting with {}. Models unload after {}s idle",
		services.chat.model().bright_blue(),
		config::idle_timeout().as_secs()
	));
	ui::info("Type a message, :help for commands, or 'exit' to quit");
	println!();

	loop {
		print!("{} ", "triad>".bright_blue().bold());
		io::stdout().flush()?;

		let mut line = String::new();
		if io::stdin().read_line(&mut line)? == 0 {
			// EOF
			break;
		}

		match parse(&line) {
			Input::Empty => continue,
			Input::Exit => break,
			Input::Chat(message) => {
				chat::ask(&mut services.chat, message);
			}
			Input::Model(None) => {
				ui::info(&format!("Current model: {}", services.chat.model().bright_blue()));
				let aliases: Vec<&str> = CHAT_MODELS.iter().map(|m| m.alias).collect();
				println!("  {}", aliases.join(", ").dimmed());
			}
			Input::Model(Some(name)) => match services.chat.switch_model(name) {
				Ok(()) => ui::success(&format!("Next messages go to {}", services.chat.model())),
				Err(e) => ui::error(&e.to_string()),
			},
			Input::Image(args) => match parse_image(args) {
				Ok((request, open)) => {
					image::generate(&services.image, &request, open);
				}
				Err(e) => report(e),
			},
			Input::Transcribe(args) => match parse_transcribe(args) {
				Ok(request) => {
					transcribe::transcribe(&services.speech, &request);
				}
				Err(e) => report(e),
			},
			Input::Save(name) => {
				if services.chat.conversation().is_empty() {
					ui::warn("Nothing to save yet");
				} else {
					match transcripts::save(&config::chats_dir(), services.chat.conversation(), name.unwrap_or_default()) {
						Ok(path) => ui::success(&format!("Saved {}", ui::path_link(&path, 60))),
						Err(e) => ui::error(&format!("{:#}", e)),
					}
				}
			}
			Input::Load(name) => {
				let path = transcripts::resolve(&config::chats_dir(), name);
				if !path.exists() {
					ui::error(&format!("No saved chat named {}", name));
					continue;
				}
				match transcripts::load(&path) {
					Ok(conversation) => {
						services.chat.set_conversation(conversation);
						chats::show(services.chat.conversation());
					}
					Err(e) => ui::error(&format!("{:#}", e)),
				}
			}
			Input::Chats => {
				if let Err(e) = chats::list(&config::chats_dir()) {
					ui::error(&format!("{:#}", e));
				}
			}
			Input::Delete(name) => {
				if let Err(e) = chats::delete(&config::chats_dir(), name) {
					ui::error(&format!("{:#}", e));
				}
			}
			Input::New => {
				let model = services.chat.model().to_string();
				services.chat.set_conversation(Conversation::new(model));
				if let Err(e) = transcripts::clear(&config::chats_dir()) {
					ui::warn(&format!("{:#}", e));
				}
				ui::success("Started a new conversation");
			}
			Input::Unload(target) => unload(services, target),
			Input::Status => show_status(&services.statuses()),
			Input::Help => show_help(),
			Input::Invalid(message) => ui::error(&message),
		}
		println!();
	}

	if let Err(e) = services.speech.reset() {
		ui::debug(&format!("Temp cleanup failed: {:#}", e));
	}
	ui::info("Goodbye!");
	Ok(())
}

fn unload(services: &Services, target: Option<Subsystem>) {
	let targets = match target {
		Some(subsystem) => vec![subsystem],
		None => Subsystem::ALL.to_vec(),
	};

	let mut any = false;
	for subsystem in targets {
		if services.unload(subsystem) {
			ui::success(&format!("{} model unloaded", subsystem.label()));
			any = true;
		}
	}
	if !any {
		ui::info("Nothing to unload");
	}
}

fn format_remaining(remaining: Option<Duration>) -> String {
	match remaining {
		Some(left) => format!("unloads in {}s", left.as_secs()),
		None => "no countdown".to_string(),
	}
}

fn show_status(statuses: &[SlotStatus]) {
	ui::header("Slots");
	for status in statuses {
		let resident = match &status.resident {
			Some(name) => name.bright_blue().to_string(),
			None => "empty".dimmed().to_string(),
		};
		println!(
			"  {:<7} {}  {}",
			status.label.yellow(),
			resident,
			format_remaining(status.idle_remaining).dimmed()
		);
		println!(
			"          {}",
			format!(
				"{} loads, {} hits, {} failed, {} evicted, {} running",
				status.stats.loads, status.stats.hits, status.stats.load_failures, status.stats.evictions, status.active
			)
			.dimmed()
		);
	}
}

fn show_help() {
	println!("{}", "Session Commands:".bright_blue().bold());
	println!("  {}                 Chat with the current model", "<text>".dimmed());
	println!("  {}         Show or switch the chat model", ":model [NAME]".dimmed());
	println!("  {}      Generate an image (-m -r -s -u -o)", ":image <prompt>".dimmed());
	println!("  {}   Transcribe audio (-m MODE -l LANGUAGE)", ":transcribe <file>".dimmed());
	println!("  {}          Save the conversation", ":save [NAME]".dimmed());
	println!("  {}          Continue a saved conversation", ":load <NAME>".dimmed());
	println!("  {}                List saved conversations", ":chats".dimmed());
	println!("  {}        Delete a saved conversation", ":delete <NAME>".dimmed());
	println!("  {}                  Start over", ":new".dimmed());
	println!("  {}   Free models now (default all)", ":unload [SUBSYSTEM]".dimmed());
	println!("  {}               Show what is loaded", ":status".dimmed());
	println!("  {}                 Exit the session", "exit".dimmed());
}
