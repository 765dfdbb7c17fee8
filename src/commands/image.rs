//! Image command - text to image

use anyhow::Result;
use colored::Colorize;

use crate::cache::{ModelLoader, Outcome};
use crate::config;
use crate::runtime::{PipelineHandle, WorkerSettings};
use crate::services::{self, ImageRequest, ImageService};
use crate::ui;

pub fn run(request: ImageRequest, open: bool) -> Result<()> {
	let settings = WorkerSettings::load()?;
	let service = services::image_service(&settings, config::idle_timeout());

	if !generate(&service, &request, open) {
		drop(service);
		std::process::exit(1);
	}
	Ok(())
}

/// Generates and reports one image. `false` if it failed.
pub fn generate<L>(service: &ImageService<L>, request: &ImageRequest, open: bool) -> bool
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	let key = services::image::cache_key(&request.model);
	if !service.orchestrator().slot().is_resident(&key) {
		ui::info(&format!("Loading {}...", key));
	}
	ui::info(&format!("Painting: {}", request.prompt.trim().bright_blue()));

	let image = match service.generate(request) {
		Outcome::Completed(image) => image,
		Outcome::Failed(_) => return false,
	};

	ui::file_written(&image.final_path, image.elapsed.as_millis());
	println!(
		"  {} {}x{}  {} {}",
		"size".dimmed(),
		image.width,
		image.height,
		"seed".dimmed(),
		image.seed.to_string().yellow()
	);
	ui::debug(&format!("Base image: {}", image.base_path.display()));

	if open {
		if let Err(e) = open::that(&image.final_path) {
			ui::warn(&format!("Failed to open: {}", e));
		}
	}
	true
}
