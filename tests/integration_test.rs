// Integration tests for Triad

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn triad(home: &Path, args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_triad"))
		.arg("--home")
		.arg(home)
		.args(args)
		.env("NO_COLOR", "1")
		.output()
		.expect("Failed to run triad")
}

fn stdout(output: &Output) -> String {
	String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_version_display() {
	let output = Command::new(env!("CARGO_BIN_EXE_triad"))
		.arg("--version")
		.output()
		.expect("Failed to run triad --version");

	assert!(output.status.success(), "Version command failed");
	assert!(stdout(&output).contains("triad"), "Expected 'triad' in version output");
}

#[test]
fn test_help_display() {
	let output = Command::new(env!("CARGO_BIN_EXE_triad"))
		.arg("--help")
		.output()
		.expect("Failed to run triad --help");

	assert!(output.status.success(), "Help command failed");
	let text = stdout(&output);
	for command in ["chat", "image", "transcribe", "session", "models"] {
		assert!(text.contains(command), "Expected {} in help output", command);
	}
}

#[test]
fn test_models_listing() {
	let home = tempfile::tempdir().unwrap();
	let output = triad(home.path(), &["models"]);

	assert!(output.status.success(), "Models command failed");
	let text = stdout(&output);
	assert!(text.contains("Llama-3.2"));
	assert!(text.contains("juggernautxl"));
	assert!(text.contains("turbo"));
}

#[test]
fn test_saved_chats() {
	let home = tempfile::tempdir().unwrap();
	assert!(stdout(&triad(home.path(), &["chats", "list"])).contains("No saved chats"));

	let chats = home.path().join("saved_chats");
	fs::create_dir_all(&chats).unwrap();
	fs::write(
		chats.join("notes.json"),
		r#"{"model":"Qwen2.5","history":[{"role":"user","content":"hola"},{"role":"assistant","content":"¡Buenas!"}]}"#,
	)
	.unwrap();
	fs::write(chats.join("_temp.json"), r#"{"model":"Qwen2.5","history":[]}"#).unwrap();

	let listing = stdout(&triad(home.path(), &["chats", "list"]));
	assert!(listing.contains("notes.json"));
	assert!(!listing.contains("_temp.json"));

	let shown = triad(home.path(), &["chats", "show", "notes"]);
	assert!(shown.status.success());
	assert!(stdout(&shown).contains("¡Buenas!"));

	assert!(triad(home.path(), &["chats", "delete", "notes"]).status.success());
	assert!(!chats.join("notes.json").exists());

	assert!(triad(home.path(), &["chats", "clear"]).status.success());
	assert!(!chats.join("_temp.json").exists());
}

#[test]
fn test_session_without_models() {
	let home = tempfile::tempdir().unwrap();
	let mut child = Command::new(env!("CARGO_BIN_EXE_triad"))
		.arg("--home")
		.arg(home.path())
		.arg("session")
		.env("NO_COLOR", "1")
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.spawn()
		.expect("Failed to start session");

	child
		.stdin
		.take()
		.unwrap()
		.write_all(b":status\n:unload\n:bogus\nexit\n")
		.unwrap();

	let output = child.wait_with_output().unwrap();
	assert!(output.status.success(), "Session exited with an error");
	let text = stdout(&output);
	assert!(text.contains("empty"));
	assert!(text.contains("Nothing to unload"));
	assert!(text.contains("unknown command"));
	assert!(text.contains("Goodbye"));
}

#[cfg(unix)]
#[test]
fn test_chat_through_worker() {
	let home = tempfile::tempdir().unwrap();
	let script = r#"read line; echo '{"ok":true}'; read line; echo '{"ok":true,"result":{"text":" Hola, amigo. User: more"}}'; read line; exit 0"#;
	let workers = serde_json::json!({ "chat": { "program": "sh", "args": ["-c", script] } });
	fs::write(home.path().join("workers.json"), workers.to_string()).unwrap();

	let output = triad(home.path(), &["chat", "hello there friend", "--save", "greeting"]);
	assert!(output.status.success(), "Chat failed: {}", stdout(&output));
	assert!(stdout(&output).contains("Hola, amigo."));

	let autosave = fs::read_to_string(home.path().join("saved_chats").join("_temp.json")).unwrap();
	assert!(autosave.contains("hello there friend"));
	assert!(autosave.contains("\"Hola, amigo.\""));
	assert!(!autosave.contains("more"));
	assert!(home.path().join("saved_chats").join("greeting.json").exists());
}

#[cfg(unix)]
#[test]
fn test_failed_chat_shuts_worker_down() {
	let home = tempfile::tempdir().unwrap();
	let marker = home.path().join("shutdown-seen");
	let script = r#"read line; echo '{"ok":true}'; read line; echo '{"ok":false,"error":"out of memory"}'; read line; case "$line" in *shutdown*) touch "$MARKER";; esac"#;
	let workers = serde_json::json!({
		"chat": { "program": "sh", "args": ["-c", script], "env": { "MARKER": marker } }
	});
	fs::write(home.path().join("workers.json"), workers.to_string()).unwrap();

	let output = triad(home.path(), &["chat", "hello there friend"]);
	assert!(!output.status.success());
	assert!(stdout(&output).contains("out of memory"));
	assert!(marker.exists(), "Worker never got the shutdown request");
}

#[cfg(unix)]
#[test]
fn test_missing_worker_fails_cleanly() {
	let home = tempfile::tempdir().unwrap();
	let workers = serde_json::json!({ "chat": { "program": "/nonexistent/triad-chat-worker" } });
	fs::write(home.path().join("workers.json"), workers.to_string()).unwrap();

	let output = triad(home.path(), &["chat", "hello"]);
	assert!(!output.status.success());
	assert!(stdout(&output).contains("failed to start worker"));
}
