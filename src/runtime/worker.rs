//! External pipeline workers
//!
//! Every resident model lives in its own worker process that owns the ML
//! library. The host talks to it with one JSON document per line:
//!
//! ```text
//! -> {"op":"load","model":{...}}      <- {"ok":true}
//! -> {"op":"run","request":{...}}     <- {"ok":true,"result":{...}}
//! -> {"op":"shutdown"}                   (process exits)
//! ```
//!
//! Failures come back as `{"ok":false,"error":"..."}`. Unloading a model
//! means ending its process, which hands the GPU memory back to the driver.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::pipeline::PipelineHandle;
use super::Subsystem;
use crate::cache::{InferenceError, LoadError, ModelLoader};
use crate::config;
use crate::ui;

/// How to start the worker for one subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerCommand {
	pub program: String,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
}

impl WorkerCommand {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			env: BTreeMap::new(),
		}
	}

	fn default_for(subsystem: Subsystem) -> Self {
		Self::new(format!("triad-{}-worker", subsystem.label()))
	}
}

/// Contents of `workers.json`; missing entries use the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerSettings {
	#[serde(default = "default_chat")]
	pub chat: WorkerCommand,
	#[serde(default = "default_image")]
	pub image: WorkerCommand,
	#[serde(default = "default_speech")]
	pub speech: WorkerCommand,
}

fn default_chat() -> WorkerCommand {
	WorkerCommand::default_for(Subsystem::Chat)
}

fn default_image() -> WorkerCommand {
	WorkerCommand::default_for(Subsystem::Image)
}

fn default_speech() -> WorkerCommand {
	WorkerCommand::default_for(Subsystem::Speech)
}

impl Default for WorkerSettings {
	fn default() -> Self {
		Self {
			chat: default_chat(),
			image: default_image(),
			speech: default_speech(),
		}
	}
}

impl WorkerSettings {
	pub fn load() -> Result<Self> {
		let path = config::workers_file();
		if !path.exists() {
			ui::debug(&format!("No {} found, using default workers", path.display()));
			return Ok(Self::default());
		}

		let text = std::fs::read_to_string(&path)
			.with_context(|| format!("Failed to read {}", path.display()))?;
		let settings: Self = serde_json::from_str(&text)
			.with_context(|| format!("Invalid worker settings in {}", path.display()))?;
		ui::debug(&format!("Worker settings loaded from {}", path.display()));
		Ok(settings)
	}

	pub fn command(&self, subsystem: Subsystem) -> &WorkerCommand {
		match subsystem {
			Subsystem::Chat => &self.chat,
			Subsystem::Image => &self.image,
			Subsystem::Speech => &self.speech,
		}
	}
}

#[derive(Debug, Deserialize)]
struct Reply {
	ok: bool,
	#[serde(default)]
	result: Value,
	#[serde(default)]
	error: Option<String>,
}

/// A running worker with one model loaded.
pub struct Worker {
	model: String,
	child: Child,
	stdin: Option<ChildStdin>,
	stdout: BufReader<ChildStdout>,
}

impl Worker {
	/// Starts the process and waits for it to acknowledge the load.
	pub fn spawn(command: &WorkerCommand, model: &str, payload: &Value) -> Result<Self, LoadError> {
		let stderr = if ui::Log::is_verbose() {
			Stdio::inherit()
		} else {
			Stdio::null()
		};

		let mut child = Command::new(&command.program)
			.args(&command.args)
			.envs(&command.env)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(stderr)
			.spawn()
			.map_err(|source| LoadError::Spawn {
				program: command.program.clone(),
				source,
			})?;

		let protocol = |reason: &str| LoadError::Protocol {
			model: model.to_string(),
			reason: reason.to_string(),
		};

		let stdin = child.stdin.take().ok_or_else(|| protocol("worker stdin unavailable"))?;
		let stdout = child.stdout.take().ok_or_else(|| protocol("worker stdout unavailable"))?;

		let mut worker = Self {
			model: model.to_string(),
			child,
			stdin: Some(stdin),
			stdout: BufReader::new(stdout),
		};
		ui::debug(&format!("Started `{}` (pid {}) for '{}'", command.program, worker.child.id(), model));

		worker
			.send(&json!({ "op": "load", "model": payload }))
			.map_err(|e| protocol(&e.to_string()))?;

		match worker.receive() {
			Ok(reply) if reply.ok => Ok(worker),
			Ok(reply) => Err(LoadError::Rejected {
				model: model.to_string(),
				reason: reply.error.unwrap_or_else(|| "no reason given".to_string()),
			}),
			Err(e) => Err(protocol(&e.to_string())),
		}
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn id(&self) -> u32 {
		self.child.id()
	}

	fn send(&mut self, message: &Value) -> Result<(), InferenceError> {
		let stdin = self.stdin.as_mut().ok_or(InferenceError::WorkerGone)?;
		let mut line = serde_json::to_vec(message)?;
		line.push(b'\n');
		stdin.write_all(&line).map_err(broken_pipe)?;
		stdin.flush().map_err(broken_pipe)?;
		Ok(())
	}

	fn receive(&mut self) -> Result<Reply, InferenceError> {
		let mut line = String::new();
		loop {
			line.clear();
			if self.stdout.read_line(&mut line)? == 0 {
				return Err(InferenceError::WorkerGone);
			}
			// Blank lines are tolerated between replies.
			if !line.trim().is_empty() {
				break;
			}
		}
		Ok(serde_json::from_str(line.trim())?)
	}

	/// Sends one request and waits for its result.
	pub fn run(&mut self, request: &Value) -> Result<Value, InferenceError> {
		self.send(&json!({ "op": "run", "request": request }))?;
		let reply = self.receive()?;
		if reply.ok {
			Ok(reply.result)
		} else {
			Err(InferenceError::Pipeline(
				reply.error.unwrap_or_else(|| "worker reported an unspecified error".to_string()),
			))
		}
	}

	/// Asks the worker to exit, killing it after `grace`.
	pub fn shutdown(mut self, grace: Duration) -> Result<()> {
		if let Err(e) = self.send(&json!({ "op": "shutdown" })) {
			ui::debug(&format!("'{}' did not take the shutdown request: {}", self.model, e));
		}
		// Closing stdin lets workers that only read until EOF exit too.
		drop(self.stdin.take());

		let started = Instant::now();
		while started.elapsed() < grace {
			if let Some(status) = self.child.try_wait()? {
				ui::debug(&format!("Worker for '{}' exited ({})", self.model, status));
				return Ok(());
			}
			thread::sleep(Duration::from_millis(25));
		}

		ui::warn(&format!(
			"Worker for '{}' ignored shutdown for {}s, killing it",
			self.model,
			grace.as_secs()
		));
		self.child
			.kill()
			.with_context(|| format!("Failed to kill worker for '{}'", self.model))?;
		self.child.wait()?;
		Ok(())
	}
}

fn broken_pipe(e: std::io::Error) -> InferenceError {
	if e.kind() == std::io::ErrorKind::BrokenPipe {
		InferenceError::WorkerGone
	} else {
		InferenceError::Io(e)
	}
}

impl Drop for Worker {
	fn drop(&mut self) {
		if let Ok(None) = self.child.try_wait() {
			let _ = self.child.kill();
			let _ = self.child.wait();
		}
	}
}

/// Worker shared by the requests of one slot.
pub struct WorkerHandle {
	worker: Mutex<Worker>,
}

impl WorkerHandle {
	pub fn new(worker: Worker) -> Self {
		Self {
			worker: Mutex::new(worker),
		}
	}

	fn lock(&self) -> MutexGuard<'_, Worker> {
		self.worker.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn into_inner(self) -> Worker {
		self.worker.into_inner().unwrap_or_else(|e| e.into_inner())
	}
}

impl PipelineHandle for WorkerHandle {
	fn run(&self, request: &Value) -> Result<Value, InferenceError> {
		self.lock().run(request)
	}
}

type Resolver = Box<dyn Fn(&str) -> Result<Value, LoadError> + Send + Sync>;

/// Loads models by starting workers.
///
/// `resolve` turns a logical model name into the payload of the load
/// message, failing for names the catalog does not know.
pub struct WorkerLoader {
	subsystem: Subsystem,
	command: WorkerCommand,
	resolve: Resolver,
}

impl WorkerLoader {
	pub fn new<F>(subsystem: Subsystem, command: WorkerCommand, resolve: F) -> Self
	where
		F: Fn(&str) -> Result<Value, LoadError> + Send + Sync + 'static,
	{
		Self {
			subsystem,
			command,
			resolve: Box::new(resolve),
		}
	}

	pub fn subsystem(&self) -> Subsystem {
		self.subsystem
	}
}

impl ModelLoader for WorkerLoader {
	type Handle = WorkerHandle;

	fn load(&self, name: &str) -> Result<WorkerHandle, LoadError> {
		let payload = (self.resolve)(name)?;
		let start = Instant::now();
		let worker = Worker::spawn(&self.command, name, &payload)?;
		ui::debug(&format!(
			"{} worker {} loaded '{}' in {:.2}s",
			self.subsystem.label(),
			worker.id(),
			name,
			start.elapsed().as_secs_f32()
		));
		Ok(WorkerHandle::new(worker))
	}

	fn release(&self, _name: &str, handle: WorkerHandle) -> Result<()> {
		handle.into_inner().shutdown(config::WORKER_SHUTDOWN_GRACE)
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	fn shell(script: &str) -> WorkerCommand {
		WorkerCommand {
			program: "sh".into(),
			args: vec!["-c".into(), script.into()],
			env: BTreeMap::new(),
		}
	}

	const ECHO_WORKER: &str = r#"read line; echo '{"ok":true}'
while read line; do
  case "$line" in
    *shutdown*) exit 0 ;;
    *) echo '{"ok":true,"result":{"text":"pong"}}' ;;
  esac
done"#;

	#[test]
	fn load_run_and_shutdown() {
		let mut worker = Worker::spawn(&shell(ECHO_WORKER), "echo", &json!({})).unwrap();
		assert_eq!(worker.model(), "echo");

		let result = worker.run(&json!({ "prompt": "ping" })).unwrap();
		assert_eq!(result, json!({ "text": "pong" }));

		worker.shutdown(Duration::from_secs(2)).unwrap();
	}

	#[test]
	fn rejected_load_carries_reason() {
		let script = r#"read line; echo '{"ok":false,"error":"weights missing"}'"#;
		match Worker::spawn(&shell(script), "broken", &json!({})) {
			Err(LoadError::Rejected { model, reason }) => {
				assert_eq!(model, "broken");
				assert_eq!(reason, "weights missing");
			}
			Err(other) => panic!("unexpected error: {}", other),
			Ok(_) => panic!("load should have been rejected"),
		}
	}

	#[test]
	fn pipeline_error_is_reported() {
		let script = r#"read line; echo '{"ok":true}'; read line; echo '{"ok":false,"error":"CUDA out of memory"}'; read line"#;
		let mut worker = Worker::spawn(&shell(script), "oom", &json!({})).unwrap();
		match worker.run(&json!({})) {
			Err(InferenceError::Pipeline(msg)) => assert_eq!(msg, "CUDA out of memory"),
			other => panic!("unexpected result: {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn dead_worker_is_detected() {
		let script = r#"read line; echo '{"ok":true}'; read line; exit 1"#;
		let mut worker = Worker::spawn(&shell(script), "flaky", &json!({})).unwrap();
		assert!(matches!(worker.run(&json!({})), Err(InferenceError::WorkerGone)));
	}

	#[test]
	fn missing_program_fails_to_spawn() {
		let command = WorkerCommand::new("/nonexistent/triad-test-worker");
		assert!(matches!(
			Worker::spawn(&command, "x", &json!({})),
			Err(LoadError::Spawn { .. })
		));
	}

	#[test]
	fn loader_resolves_before_spawning() {
		let loader = WorkerLoader::new(Subsystem::Chat, shell(ECHO_WORKER), |name| {
			if name == "known" {
				Ok(json!({ "name": name }))
			} else {
				Err(LoadError::UnknownModel(name.to_string()))
			}
		});

		assert!(matches!(loader.load("other"), Err(LoadError::UnknownModel(_))));

		let handle = loader.load("known").unwrap();
		assert_eq!(handle.run(&json!({})).unwrap(), json!({ "text": "pong" }));
		loader.release("known", handle).unwrap();
	}

	#[test]
	fn settings_fill_missing_entries() {
		let settings: WorkerSettings =
			serde_json::from_str(r#"{"chat": {"program": "python3", "args": ["chat_worker.py"]}}"#).unwrap();
		assert_eq!(settings.chat.args, vec!["chat_worker.py".to_string()]);
		assert_eq!(settings.image.program, "triad-image-worker");
		assert_eq!(settings.command(Subsystem::Speech).program, "triad-speech-worker");
	}
}
