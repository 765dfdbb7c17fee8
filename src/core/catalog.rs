//! Model catalogs for the three subsystems

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::resolution::Resolution;
use crate::config::{UPSCALERS_DIR, VAE_DIR};

const GIB: u64 = 1024 * 1024 * 1024;

// === Chat ===

#[derive(Debug, Clone, Serialize)]
pub struct ChatModel {
	/// Short name shown to users
	pub alias: &'static str,
	pub name: &'static str,
	pub repo_id: &'static str,
	pub task: &'static str,
	pub max_new_tokens: u32,
	pub temperature: f32,
	pub top_p: f32,
	pub trust_remote_code: bool,
	/// Appended to the default system prompt
	#[serde(skip)]
	pub persona: &'static str,
}

pub const CHAT_MODELS: &[ChatModel] = &[
	ChatModel {
		alias: "Llama-3.2",
		name: "Llama-3.2-3B-Instruct",
		repo_id: "meta-llama/Llama-3.2-3B-Instruct",
		task: "text-generation",
		max_new_tokens: 1024,
		temperature: 0.7,
		top_p: 0.9,
		trust_remote_code: false,
		persona: "You are an AI expert with broad knowledge of weak and strong AI. \
			Give detailed answers, use examples and clarify why each term is named the way it is.",
	},
	ChatModel {
		alias: "Instella-3B",
		name: "Instella-3B-Instruct",
		repo_id: "amd/Instella-3B-Instruct",
		task: "text-generation",
		max_new_tokens: 1024,
		temperature: 0.6,
		top_p: 0.9,
		trust_remote_code: true,
		persona: "You are an assistant optimised by AMD, excellent at explaining processes and chains \
			of reasoning clearly and fluently. Use your coherence to structure answers well.",
	},
	ChatModel {
		alias: "Qwen2.5",
		name: "Qwen2.5-3B-Instruct",
		repo_id: "Qwen/Qwen2.5-3B-Instruct",
		task: "text-generation",
		max_new_tokens: 1024,
		temperature: 0.6,
		top_p: 0.85,
		trust_remote_code: false,
		persona: "You specialise in structured answers. Offer outlines, lists and subheadings when useful.",
	},
	ChatModel {
		alias: "Stable-Code",
		name: "Stable-Code-Instruct-3B",
		repo_id: "stabilityai/stable-code-instruct-3b",
		task: "text-generation",
		max_new_tokens: 1024,
		temperature: 0.2,
		top_p: 0.95,
		trust_remote_code: false,
		persona: "You are a programming assistant: explain bug fixes step by step and write clean code.",
	},
];

/// Looks up a chat model by alias or full name.
pub fn chat_model(name: &str) -> Option<&'static ChatModel> {
	CHAT_MODELS
		.iter()
		.find(|m| m.alias.eq_ignore_ascii_case(name) || m.name.eq_ignore_ascii_case(name))
}

impl ChatModel {
	/// Local cache directory for the weights
	pub fn cache_dir(&self, models_dir: &Path) -> PathBuf {
		models_dir.join("chat").join(self.name)
	}
}

// === Image ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
	Sd15,
	Sdxl,
}

impl ImageKind {
	/// Only SD 1.5 checkpoints get the second hires pass
	pub fn supports_hires_fix(&self) -> bool {
		matches!(self, ImageKind::Sd15)
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageModel {
	pub key: &'static str,
	pub name: &'static str,
	pub kind: ImageKind,
	pub dir: &'static str,
	pub file: &'static str,
	pub vae: Option<&'static str>,
	pub vram_required: &'static str,
	pub resolutions: &'static [Resolution],
	pub steps: u32,
	pub cfg_scale: f32,
	pub sampler: &'static str,
}

pub const IMAGE_MODELS: &[ImageModel] = &[
	ImageModel {
		key: "realisticvision-v6",
		name: "Realistic Vision V6.0 B1",
		kind: ImageKind::Sd15,
		dir: "realisticvision-v6",
		file: "Realistic_Vision_V6.0_NV_B1.safetensors",
		vae: Some("vae-ft-mse-840000-ema-pruned.safetensors"),
		vram_required: "8 GB",
		resolutions: &[
			Resolution::new(512, 512),
			Resolution::new(576, 768),
			Resolution::new(512, 896),
			Resolution::new(640, 832),
			Resolution::new(768, 512),
			Resolution::new(896, 512),
		],
		steps: 30,
		cfg_scale: 7.0,
		sampler: "dpmpp_2m_karras",
	},
	ImageModel {
		key: "juggernautxl",
		name: "Juggernaut XL v9",
		kind: ImageKind::Sdxl,
		dir: "juggernautxl-v9",
		file: "Juggernaut-XL_v9_RunDiffusionPhoto_v2.safetensors",
		vae: None,
		vram_required: "10-12 GB",
		resolutions: &[
			Resolution::new(1024, 1024),
			Resolution::new(1216, 832),
			Resolution::new(832, 1216),
		],
		steps: 25,
		cfg_scale: 2.0,
		sampler: "dpmpp_sde_karras",
	},
];

pub fn image_model(key: &str) -> Option<&'static ImageModel> {
	IMAGE_MODELS.iter().find(|m| m.key.eq_ignore_ascii_case(key))
}

impl ImageModel {
	pub fn path(&self, models_dir: &Path) -> PathBuf {
		models_dir.join(self.dir).join(self.file)
	}

	pub fn vae_path(&self, models_dir: &Path) -> Option<PathBuf> {
		self.vae.map(|file| models_dir.join(VAE_DIR).join(file))
	}

	pub fn default_resolution(&self) -> Resolution {
		self.resolutions[0]
	}

	pub fn is_preset(&self, resolution: Resolution) -> bool {
		self.resolutions.contains(&resolution)
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct Upscaler {
	pub key: &'static str,
	pub name: &'static str,
	pub file: &'static str,
	/// Native pass scale before resizing to the target factor
	pub scale: f32,
}

pub const UPSCALERS: &[Upscaler] = &[
	Upscaler {
		key: "realistic",
		name: "RealESRGAN_x4plus",
		file: "RealESRGAN_x4plus.pth",
		scale: 1.75,
	},
	Upscaler {
		key: "anime",
		name: "RealESRGAN_x4plus_anime_6B",
		file: "RealESRGAN_x4plus_anime_6B.pth",
		scale: 1.75,
	},
	Upscaler {
		key: "general",
		name: "realesr-general-x4v3",
		file: "realesr-general-x4v3.pth",
		scale: 1.75,
	},
];

/// `None` for the `none` key; `Err` for keys nobody knows.
pub fn upscaler(key: &str) -> Result<Option<&'static Upscaler>, String> {
	if key.is_empty() || key.eq_ignore_ascii_case("none") {
		return Ok(None);
	}
	UPSCALERS
		.iter()
		.find(|u| u.key.eq_ignore_ascii_case(key))
		.map(Some)
		.ok_or_else(|| {
			let keys: Vec<&str> = UPSCALERS.iter().map(|u| u.key).collect();
			format!("unknown upscaler '{}', expected none or one of: {}", key, keys.join(", "))
		})
}

impl Upscaler {
	pub fn path(&self, models_dir: &Path) -> PathBuf {
		models_dir.join(UPSCALERS_DIR).join(self.file)
	}
}

// === Speech ===

#[derive(Debug, Clone, Serialize)]
pub struct SpeechModel {
	pub mode: &'static str,
	pub name: &'static str,
	pub repo: &'static str,
	pub vram_bytes: u64,
}

pub const SPEECH_MODELS: &[SpeechModel] = &[
	SpeechModel {
		mode: "turbo",
		name: "faster-whisper-large-v3-turbo",
		repo: "mobiuslabsgmbh/faster-whisper-large-v3-turbo",
		vram_bytes: 6 * GIB,
	},
	SpeechModel {
		mode: "accurate",
		name: "faster-whisper-large-v3",
		repo: "Systran/faster-whisper-large-v3",
		vram_bytes: 10 * GIB,
	},
];

pub const AUTO_MODE: &str = "auto";

pub fn speech_model(mode: &str) -> Option<&'static SpeechModel> {
	SPEECH_MODELS.iter().find(|m| m.mode.eq_ignore_ascii_case(mode))
}

/// Resolves `auto` against the GPU memory in bytes (`None` without a GPU).
pub fn resolve_speech_mode(requested: &str, gpu_memory: Option<u64>) -> &'static SpeechModel {
	if let Some(model) = speech_model(requested) {
		return model;
	}
	let accurate = &SPEECH_MODELS[1];
	match gpu_memory {
		Some(total) if total >= accurate.vram_bytes => accurate,
		_ => &SPEECH_MODELS[0],
	}
}

impl SpeechModel {
	pub fn path(&self, models_dir: &Path) -> PathBuf {
		models_dir.join("speech").join(self.name)
	}
}

pub const LANGUAGES: &[(&str, &str)] = &[
	("Spanish", "es"),
	("English", "en"),
	("French", "fr"),
	("German", "de"),
	("Italian", "it"),
];

/// Maps a language name or code to its code; `auto` means detect.
pub fn language_code(input: &str) -> Result<Option<&'static str>, String> {
	let input = input.trim();
	if input.is_empty() || input.eq_ignore_ascii_case(AUTO_MODE) {
		return Ok(None);
	}
	LANGUAGES
		.iter()
		.find(|(name, code)| name.eq_ignore_ascii_case(input) || code.eq_ignore_ascii_case(input))
		.map(|(_, code)| Some(*code))
		.ok_or_else(|| format!("unsupported language '{}'", input))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chat_lookup_accepts_alias_and_full_name() {
		assert_eq!(chat_model("Qwen2.5").map(|m| m.name), Some("Qwen2.5-3B-Instruct"));
		assert_eq!(chat_model("stable-code-instruct-3b").map(|m| m.alias), Some("Stable-Code"));
		assert!(chat_model("gpt-5").is_none());
		assert!(chat_model("Instella-3B").unwrap().trust_remote_code);
	}

	#[test]
	fn image_presets() {
		let sd = image_model("realisticvision-v6").unwrap();
		assert!(sd.kind.supports_hires_fix());
		assert_eq!(sd.default_resolution(), Resolution::new(512, 512));
		assert!(sd.is_preset(Resolution::new(768, 512)));
		assert!(!sd.is_preset(Resolution::new(1024, 1024)));

		let xl = image_model("juggernautxl").unwrap();
		assert!(!xl.kind.supports_hires_fix());
		assert!(xl.vae_path(Path::new("m")).is_none());
	}

	#[test]
	fn upscaler_keys() {
		assert!(upscaler("none").unwrap().is_none());
		assert!(upscaler("").unwrap().is_none());
		assert_eq!(upscaler("Anime").unwrap().unwrap().name, "RealESRGAN_x4plus_anime_6B");
		assert!(upscaler("waifu").is_err());
	}

	#[test]
	fn auto_mode_follows_gpu_memory() {
		assert_eq!(resolve_speech_mode("auto", None).mode, "turbo");
		assert_eq!(resolve_speech_mode("auto", Some(8 * GIB)).mode, "turbo");
		assert_eq!(resolve_speech_mode("auto", Some(12 * GIB)).mode, "accurate");
		assert_eq!(resolve_speech_mode("turbo", Some(24 * GIB)).mode, "turbo");
		assert_eq!(resolve_speech_mode("accurate", None).mode, "accurate");
	}

	#[test]
	fn languages() {
		assert_eq!(language_code("Auto"), Ok(None));
		assert_eq!(language_code("spanish"), Ok(Some("es")));
		assert_eq!(language_code("DE"), Ok(Some("de")));
		assert!(language_code("Klingon").is_err());
	}
}
