//! # Image Generation
//!
//! Text-to-image with an optional hires pass (SD 1.5 only) and an
//! optional Real-ESRGAN upscale. The worker writes both the base and the
//! final PNG; the host picks the file names and verifies the results.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cache::{Failure, InferenceError, LoadError, ModelLoader, Orchestrator, Outcome};
use crate::config::{self, HIRES_DENOISE, HIRES_FACTOR, NEGATIVE_PROMPT, UPSCALE_TARGET};
use crate::core::catalog::{image_model, upscaler};
use crate::core::{ImageModel, Resolution, Upscaler};
use crate::runtime::gpu::{self, Device};
use crate::runtime::{invoke, PipelineHandle, Subsystem, WorkerCommand, WorkerLoader};
use crate::storage::outputs;
use crate::ui;

/// What the user asked for. Unset fields fall back to model defaults.
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
	pub prompt: String,
	pub model: String,
	pub resolution: Option<Resolution>,
	/// Negative or missing means random
	pub seed: Option<i64>,
	pub upscaler: Option<String>,
}

#[derive(Debug, Serialize)]
struct HiresPass {
	factor: f32,
	denoise: f32,
}

#[derive(Debug, Serialize)]
struct UpscalePass {
	model_path: PathBuf,
	scale: f32,
	target: f32,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
	prompt: &'a str,
	negative_prompt: &'a str,
	width: u32,
	height: u32,
	steps: u32,
	cfg_scale: f32,
	sampler: &'a str,
	seed: u64,
	hires: Option<HiresPass>,
	upscale: Option<UpscalePass>,
	base_path: &'a Path,
	final_path: &'a Path,
}

#[derive(Debug, Deserialize)]
struct GenerationReply {
	/// Seconds spent per stage
	#[serde(default)]
	timings: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
	pub model: String,
	pub seed: u64,
	pub base_path: PathBuf,
	pub final_path: PathBuf,
	pub width: u32,
	pub height: u32,
	pub elapsed: Duration,
}

/// Checks the checkpoint exists and describes it for the worker.
pub fn load_payload(model: &ImageModel, models_dir: &Path, device: Device) -> Result<Value, LoadError> {
	let checkpoint = model.path(models_dir);
	if !checkpoint.is_file() {
		return Err(LoadError::MissingFiles(checkpoint));
	}

	let vae = model.vae_path(models_dir).filter(|path| {
		let found = path.is_file();
		if !found {
			ui::warn(&format!("VAE {} not found, using the built-in one", path.display()));
		}
		found
	});

	Ok(json!({
		"name": model.name,
		"kind": model.kind,
		"checkpoint": checkpoint,
		"vae": vae,
		"device": device.as_str(),
	}))
}

pub fn worker_loader(command: WorkerCommand) -> WorkerLoader {
	let models_dir = config::models_dir();
	WorkerLoader::new(Subsystem::Image, command, move |name| {
		let model = image_model(name).ok_or_else(|| LoadError::UnknownModel(name.to_string()))?;
		load_payload(model, &models_dir, gpu::device())
	})
}

/// Catalog spelling of `name`, so case variants share one cache entry.
pub fn cache_key(name: &str) -> String {
	image_model(name).map_or_else(|| name.to_string(), |m| m.key.to_string())
}

/// Negative and absent seeds draw a random one.
pub fn resolve_seed(seed: Option<i64>) -> u64 {
	match seed {
		Some(seed) if seed >= 0 => seed as u64,
		_ => rand::rng().random::<u32>() as u64,
	}
}

pub struct ImageService<L: ModelLoader> {
	orchestrator: Orchestrator<L>,
	models_dir: PathBuf,
	outputs_dir: PathBuf,
}

impl<L> ImageService<L>
where
	L: ModelLoader,
	L::Handle: PipelineHandle,
{
	pub fn new(orchestrator: Orchestrator<L>, models_dir: PathBuf, outputs_dir: PathBuf) -> Self {
		Self {
			orchestrator,
			models_dir,
			outputs_dir,
		}
	}

	pub fn orchestrator(&self) -> &Orchestrator<L> {
		&self.orchestrator
	}

	/// Looks up the upscaler and checks its weights; missing weights only warn.
	fn select_upscaler(&self, key: Option<&str>) -> Result<Option<&'static Upscaler>, InferenceError> {
		let Some(selected) = upscaler(key.unwrap_or_default()).map_err(InferenceError::InvalidRequest)? else {
			return Ok(None);
		};
		let path = selected.path(&self.models_dir);
		if !path.is_file() {
			ui::warn(&format!(
				"Upscaler {} not found at {}, skipping upscale",
				selected.name,
				path.display()
			));
			return Ok(None);
		}
		Ok(Some(selected))
	}

	pub fn generate(&self, request: &ImageRequest) -> Outcome<GeneratedImage> {
		match self.prepare(request) {
			Ok(prepared) => self.run(request, prepared),
			Err(e) => {
				ui::error(&format!("image: {}", e));
				Outcome::Failed(Failure::Inference(e))
			}
		}
	}

	fn prepare(&self, request: &ImageRequest) -> Result<Prepared, InferenceError> {
		if request.prompt.trim().is_empty() {
			return Err(InferenceError::InvalidRequest("empty prompt".to_string()));
		}

		let model = image_model(&request.model);
		let resolution = match (request.resolution, model) {
			(Some(resolution), Some(model)) => {
				if !model.is_preset(resolution) {
					ui::warn(&format!(
						"{} is not a preset for {}, results may degrade",
						resolution, model.name
					));
				}
				resolution
			}
			(Some(resolution), None) => resolution,
			(None, Some(model)) => model.default_resolution(),
			(None, None) => Resolution::new(512, 512),
		};

		Ok(Prepared {
			key: cache_key(&request.model),
			model,
			resolution,
			seed: resolve_seed(request.seed),
			upscaler: self.select_upscaler(request.upscaler.as_deref())?,
		})
	}

	fn run(&self, request: &ImageRequest, prepared: Prepared) -> Outcome<GeneratedImage> {
		let Prepared {
			key,
			model,
			resolution,
			seed,
			upscaler,
		} = prepared;

		let (base_path, final_path) = outputs::image_paths(&self.outputs_dir, &key, outputs::unix_now());
		let hires = model
			.filter(|m| m.kind.supports_hires_fix())
			.map(|_| HiresPass {
				factor: HIRES_FACTOR,
				denoise: HIRES_DENOISE,
			});
		let expected = if hires.is_some() {
			resolution.scaled(HIRES_FACTOR)
		} else {
			resolution
		};
		let upscale = upscaler.map(|u| UpscalePass {
			model_path: u.path(&self.models_dir),
			scale: u.scale,
			target: UPSCALE_TARGET,
		});

		let generation = GenerationRequest {
			prompt: request.prompt.trim(),
			negative_prompt: NEGATIVE_PROMPT,
			width: resolution.width,
			height: resolution.height,
			steps: model.map_or(30, |m| m.steps),
			cfg_scale: model.map_or(7.0, |m| m.cfg_scale),
			sampler: model.map_or("dpmpp_2m_karras", |m| m.sampler),
			seed,
			hires,
			upscale,
			base_path: &base_path,
			final_path: &final_path,
		};

		let upscaling = generation.upscale.is_some();
		ui::debug(&format!("Generating {} with seed {}", resolution, seed));
		let start = Instant::now();
		let outputs_dir = &self.outputs_dir;

		self.orchestrator.handle_request(&key, |handle| {
			std::fs::create_dir_all(outputs_dir)?;
			let reply: GenerationReply = invoke(handle, &generation)?;
			for (stage, secs) in &reply.timings {
				ui::debug(&format!("{}: {:.2}s", stage, secs));
			}

			let (width, height) = image::image_dimensions(&final_path).map_err(|e| {
				InferenceError::Pipeline(format!("unreadable output {}: {}", final_path.display(), e))
			})?;
			if !upscaling && (width, height) != (expected.width, expected.height) {
				ui::warn(&format!("Expected {} but the worker produced {}x{}", expected, width, height));
			}

			Ok(GeneratedImage {
				model: key.clone(),
				seed,
				base_path: base_path.clone(),
				final_path: final_path.clone(),
				width,
				height,
				elapsed: start.elapsed(),
			})
		})
	}
}

struct Prepared {
	key: String,
	model: Option<&'static ImageModel>,
	resolution: Resolution,
	seed: u64,
	upscaler: Option<&'static Upscaler>,
}
