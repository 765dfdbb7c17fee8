//! Triad - chat, image and speech models with idle eviction
//!
//! Models load when first asked for and leave GPU memory again once
//! nobody has used them for a while.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::time::Duration;

use triad::cli::{Cli, Command};
use triad::commands;
use triad::config;
use triad::runtime::audio;
use triad::ui::{self, Log};

fn main() -> Result<()> {
	let cli = Cli::parse();

	Log::set_verbose(cli.verbose);
	if let Some(home) = cli.home {
		config::set_home(home);
	}
	if let Some(secs) = cli.idle_timeout {
		config::set_idle_timeout(Duration::from_secs(secs));
	}
	if let Some(ffmpeg) = cli.ffmpeg {
		audio::set_ffmpeg_path(ffmpeg);
	}
	ui::debug(&format!("Home: {}", config::home_dir().display()));

	match cli.command {
		Command::Chat {
			message,
			model,
			load,
			save,
		} => commands::chat::run(message.as_deref(), model.as_deref(), load.as_deref(), save.as_deref()),
		Command::Image(args) => commands::image::run(args.request(), args.open),
		Command::Transcribe(args) => commands::transcribe::run(args.request()),
		Command::Chats { action } => commands::chats::run(&action),
		Command::Models => commands::models::run(),
		Command::Session { model } => commands::session::run(model.as_deref()),
		Command::Help { subcommand } => {
			let mut cmd = Cli::command();
			if let Some(sub) = subcommand {
				if let Some(sub_cmd) = cmd.find_subcommand_mut(&sub) {
					sub_cmd.print_help()?;
				} else {
					ui::error(&format!("Unknown subcommand: {}", sub));
					cmd.print_help()?;
				}
			} else {
				cmd.print_help()?;
			}
			Ok(())
		}
	}
}
