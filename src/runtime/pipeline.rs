//! Typed requests against a loaded pipeline

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::InferenceError;

/// A loaded model that answers JSON requests.
pub trait PipelineHandle: Send + Sync + 'static {
	fn run(&self, request: &Value) -> Result<Value, InferenceError>;
}

/// Serializes `request`, runs it and decodes the reply.
pub fn invoke<H, Req, Resp>(handle: &H, request: &Req) -> Result<Resp, InferenceError>
where
	H: PipelineHandle + ?Sized,
	Req: Serialize,
	Resp: DeserializeOwned,
{
	let request = serde_json::to_value(request)?;
	let reply = handle.run(&request)?;
	Ok(serde_json::from_value(reply)?)
}
