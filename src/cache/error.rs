//! Load and inference failures

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A model could not be made resident. The slot stays empty.
#[derive(Debug, Error)]
pub enum LoadError {
	#[error("unknown model '{0}'")]
	UnknownModel(String),

	#[error("model files not found: {}", .0.display())]
	MissingFiles(PathBuf),

	#[error("failed to start worker `{program}`: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("worker rejected '{model}': {reason}")]
	Rejected { model: String, reason: String },

	#[error("worker protocol error while loading '{model}': {reason}")]
	Protocol { model: String, reason: String },
}

/// A pipeline call failed. Residency is left untouched.
#[derive(Debug, Error)]
pub enum InferenceError {
	#[error("{0}")]
	Pipeline(String),

	#[error("worker i/o failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("worker exited unexpectedly")]
	WorkerGone,

	#[error("malformed pipeline payload: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("invalid request: {0}")]
	InvalidRequest(String),
}

/// Why a request did not complete.
#[derive(Debug)]
pub enum Failure {
	Load(LoadError),
	Inference(InferenceError),
}

impl fmt::Display for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Failure::Load(e) => write!(f, "load failed: {}", e),
			Failure::Inference(e) => write!(f, "generation failed: {}", e),
		}
	}
}

/// Result value returned across the orchestrator boundary.
///
/// Failures are values, never panics or process exits: callers print the
/// message and keep serving.
#[derive(Debug)]
pub enum Outcome<R> {
	Completed(R),
	Failed(Failure),
}

impl<R> Outcome<R> {
	pub fn is_completed(&self) -> bool {
		matches!(self, Outcome::Completed(_))
	}

	pub fn completed(self) -> Option<R> {
		match self {
			Outcome::Completed(r) => Some(r),
			Outcome::Failed(_) => None,
		}
	}

	pub fn failure(&self) -> Option<&Failure> {
		match self {
			Outcome::Completed(_) => None,
			Outcome::Failed(f) => Some(f),
		}
	}

	pub fn map<T>(self, f: impl FnOnce(R) -> T) -> Outcome<T> {
		match self {
			Outcome::Completed(r) => Outcome::Completed(f(r)),
			Outcome::Failed(e) => Outcome::Failed(e),
		}
	}

	/// Converts into an `anyhow` result for one-shot commands.
	pub fn into_result(self) -> anyhow::Result<R> {
		match self {
			Outcome::Completed(r) => Ok(r),
			Outcome::Failed(f) => Err(anyhow::anyhow!("{}", f)),
		}
	}
}
