//! Application configuration and constants

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

static CUSTOM_HOME: OnceLock<PathBuf> = OnceLock::new();
static CUSTOM_IDLE_TIMEOUT: OnceLock<Duration> = OnceLock::new();

// === Residency ===
pub const IDLE_TIMEOUT_SECS: u64 = 120;
/// Share of total GPU memory a chat model may claim.
pub const GPU_MEMORY_FRACTION: f32 = 0.9;
/// How long a worker gets to exit on its own before it is killed.
pub const WORKER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// === Layout ===
pub const HOME_ENV: &str = "TRIAD_HOME";
pub const WORKERS_FILE: &str = "workers.json";
pub const MODELS_DIR: &str = "models";
pub const CHATS_DIR: &str = "saved_chats";
pub const TEMP_CHAT_FILE: &str = "_temp.json";
pub const OUTPUTS_DIR: &str = "outputs";
pub const TEMP_DIR: &str = "temp";
pub const UPSCALERS_DIR: &str = "upscalers";
pub const VAE_DIR: &str = "vae";

// === Chat ===
pub const DEFAULT_CHAT_MODEL: &str = "Llama-3.2";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that is always helpful and shares \
	everything it knows, but unless you are asked for help with languages you may only answer in SPANISH.";
/// Untitled chats take their name from the first user message longer than this.
pub const TITLE_MIN_CHARS: usize = 10;
pub const TITLE_MAX_CHARS: usize = 50;

// === Image ===
pub const DEFAULT_IMAGE_MODEL: &str = "realisticvision-v6";
pub const NEGATIVE_PROMPT: &str = "nsfw, naked, nude, low quality, worst quality, jpeg artifacts, blurry, \
	text, watermark, cropped, out of frame, \
	bad anatomy, wrong anatomy, mutated, mutation, deformed, distorted, disfigured, \
	poorly drawn face, poorly drawn hands, malformed limbs, extra limbs, missing limbs, fused fingers, \
	too many fingers, long neck, duplicate, morbid, mutilated, ugly, disgusting, \
	3d, cgi, sketch, cartoon, drawing, anime:1.2";
pub const HIRES_DENOISE: f32 = 0.25;
pub const HIRES_FACTOR: f32 = 1.5;
pub const UPSCALE_TARGET: f32 = 1.99;

// === Speech ===
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;
pub const BEAM_SIZE: u32 = 5;
pub const TRANSCRIPT_FILE: &str = "output_transcription.txt";
pub const SUBTITLES_FILE: &str = "output_subtitles.srt";
pub const TEMP_AUDIO_FILE: &str = "input.wav";

pub fn set_home(path: PathBuf) {
	let _ = CUSTOM_HOME.set(path);
}

pub fn set_idle_timeout(timeout: Duration) {
	let _ = CUSTOM_IDLE_TIMEOUT.set(timeout);
}

/// Root of all state (--home, then TRIAD_HOME, then the working directory)
pub fn home_dir() -> PathBuf {
	if let Some(custom) = CUSTOM_HOME.get() {
		return custom.clone();
	}

	if let Ok(env_path) = std::env::var(HOME_ENV) {
		if !env_path.is_empty() {
			return PathBuf::from(env_path);
		}
	}

	PathBuf::from(".")
}

pub fn idle_timeout() -> Duration {
	CUSTOM_IDLE_TIMEOUT
		.get()
		.copied()
		.unwrap_or(Duration::from_secs(IDLE_TIMEOUT_SECS))
}

pub fn models_dir() -> PathBuf {
	home_dir().join(MODELS_DIR)
}

pub fn chats_dir() -> PathBuf {
	home_dir().join(CHATS_DIR)
}

pub fn outputs_dir() -> PathBuf {
	home_dir().join(OUTPUTS_DIR)
}

pub fn temp_dir() -> PathBuf {
	home_dir().join(TEMP_DIR)
}

pub fn workers_file() -> PathBuf {
	home_dir().join(WORKERS_FILE)
}
